use housie::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Trusts `"admin:<id>"` and `"player:<id>"` tokens. Development only.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        parse_token(token)
    }
}

fn parse_token(token: &str) -> Result<Identity, SessionError> {
    let (role, raw) = token
        .split_once(':')
        .ok_or_else(|| SessionError::AuthFailed("token must look like role:id".into()))?;
    let id: u64 = raw
        .parse()
        .map_err(|_| SessionError::AuthFailed(format!("bad player id {raw:?}")))?;
    match role {
        "admin" => Ok(Identity::admin(PlayerId(id))),
        "player" => Ok(Identity::player(PlayerId(id))),
        other => Err(SessionError::AuthFailed(format!("unknown role {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Settings {
    bind: String,
    game_config: Option<String>,
    seed: Option<u64>,
}

impl Settings {
    /// Reads `HOUSIE_BIND`, `HOUSIE_GAME_CONFIG` and `HOUSIE_SEED`.
    fn from_env(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let seed = match var("HOUSIE_SEED") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|_| format!("HOUSIE_SEED must be a number, got {raw:?}"))?,
            ),
            None => None,
        };
        Ok(Self {
            bind: var("HOUSIE_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            game_config: var("HOUSIE_GAME_CONFIG"),
            seed,
        })
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env(|key| std::env::var(key).ok())?;
    let game = match &settings.game_config {
        Some(path) => GameConfig::from_path(path).map_err(HousieError::from)?,
        None => GameConfig::default(),
    };
    tracing::info!(
        bind = %settings.bind,
        game_types = game.game_types.len(),
        seed = ?settings.seed,
        "starting housie server"
    );

    let mut builder = HousieServer::<TokenAuth>::builder()
        .bind(&settings.bind)
        .game_config(game);
    if let Some(seed) = settings.seed {
        builder = builder.seed(seed);
    }
    let server = builder.build(TokenAuth).await?;

    server.run().await?;
    Ok(())
}
