//! Room actor: one Tokio task per room, owning its [`RoomGame`].
//!
//! Every mutation of a room goes through the actor's bounded command
//! channel and is applied one at a time, in arrival order. The same
//! `select!` loop also owns the automatic-draw timer, so a draw can never
//! interleave with a command or fire after the room has stopped it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use housie_caller::Draw;
use housie_protocol::{
    CallMode, Pattern, PlayerId, PlayerView, RoomId, RoomSnapshot, WinnerRecord,
};
use housie_session::{BroadcastBus, Origin};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::state::{Audience, Effect, JoinOutcome, JoinRequest, RoomGame, RoomInfo};
use crate::store::{Payment, Persistence};
use crate::RoomError;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor.
///
/// `origin` names the connection and request behind the command so the
/// events it causes can be correlated and joins can subscribe the caller.
pub(crate) enum RoomCommand {
    Join {
        req: JoinRequest,
        origin: Option<Origin>,
        reply: Reply<JoinOutcome>,
    },
    Leave {
        player_id: PlayerId,
        origin: Option<Origin>,
        reply: Reply<RoomSnapshot>,
    },
    Start {
        admin_id: PlayerId,
        origin: Option<Origin>,
        reply: Reply<RoomSnapshot>,
    },
    CallNumber {
        admin_id: PlayerId,
        origin: Option<Origin>,
        reply: Reply<Draw>,
    },
    Mark {
        player_id: PlayerId,
        number: u8,
        origin: Option<Origin>,
        reply: Reply<PlayerView>,
    },
    Claim {
        player_id: PlayerId,
        pattern: Pattern,
        origin: Option<Origin>,
        reply: Reply<WinnerRecord>,
    },
    SetCallMode {
        admin_id: PlayerId,
        mode: CallMode,
        origin: Option<Origin>,
        reply: Reply<RoomSnapshot>,
    },
    End {
        admin_id: PlayerId,
        origin: Option<Origin>,
        reply: Reply<RoomSnapshot>,
    },
    Withdraw {
        player_id: PlayerId,
        amount: u64,
        origin: Option<Origin>,
        reply: Reply<PlayerView>,
    },
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },
    Info {
        reply: Reply<RoomInfo>,
    },
    /// Hands the room to persistence and stops the actor.
    Archive {
        reply: Reply<RoomSnapshot>,
    },
    #[cfg(test)]
    Fault {
        reply: Reply<()>,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn join(&self, req: JoinRequest, origin: Option<Origin>) -> Result<JoinOutcome, RoomError> {
        self.request(|reply| RoomCommand::Join { req, origin, reply }).await
    }

    pub async fn leave(&self, player_id: PlayerId, origin: Option<Origin>) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Leave {
            player_id,
            origin,
            reply,
        })
        .await
    }

    pub async fn start(&self, admin_id: PlayerId, origin: Option<Origin>) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Start {
            admin_id,
            origin,
            reply,
        })
        .await
    }

    pub async fn call_number(&self, admin_id: PlayerId, origin: Option<Origin>) -> Result<Draw, RoomError> {
        self.request(|reply| RoomCommand::CallNumber {
            admin_id,
            origin,
            reply,
        })
        .await
    }

    pub async fn mark(
        &self,
        player_id: PlayerId,
        number: u8,
        origin: Option<Origin>,
    ) -> Result<PlayerView, RoomError> {
        self.request(|reply| RoomCommand::Mark {
            player_id,
            number,
            origin,
            reply,
        })
        .await
    }

    pub async fn claim(
        &self,
        player_id: PlayerId,
        pattern: Pattern,
        origin: Option<Origin>,
    ) -> Result<WinnerRecord, RoomError> {
        self.request(|reply| RoomCommand::Claim {
            player_id,
            pattern,
            origin,
            reply,
        })
        .await
    }

    pub async fn set_call_mode(
        &self,
        admin_id: PlayerId,
        mode: CallMode,
        origin: Option<Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::SetCallMode {
            admin_id,
            mode,
            origin,
            reply,
        })
        .await
    }

    pub async fn end(&self, admin_id: PlayerId, origin: Option<Origin>) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::End {
            admin_id,
            origin,
            reply,
        })
        .await
    }

    pub async fn withdraw(
        &self,
        player_id: PlayerId,
        amount: u64,
        origin: Option<Origin>,
    ) -> Result<PlayerView, RoomError> {
        self.request(|reply| RoomCommand::Withdraw {
            player_id,
            amount,
            origin,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub async fn archive(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Archive { reply }).await
    }

    #[cfg(test)]
    pub(crate) async fn inject_fault(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Fault { reply }).await
    }
}

enum Flow {
    Continue,
    Stop,
}

struct RoomActor {
    room_id: RoomId,
    game: RoomGame,
    bus: BroadcastBus,
    writer: mpsc::UnboundedSender<StoreWrite>,
    receiver: mpsc::Receiver<RoomCommand>,
}

/// A record queued for the room's writer.
enum StoreWrite {
    Player(PlayerView),
    Room(RoomSnapshot),
    Payment(Payment),
}

impl StoreWrite {
    fn kind(&self) -> &'static str {
        match self {
            StoreWrite::Player(_) => "player",
            StoreWrite::Room(_) => "room",
            StoreWrite::Payment(_) => "payment",
        }
    }
}

/// Spawns the task that saves one room's records.
///
/// Writes are awaited one at a time in queue order, so a slow save can't
/// land after a newer record for the same key. The task drains what is
/// queued and exits once the actor drops its sender.
fn spawn_writer(room_id: RoomId, store: Arc<dyn Persistence>) -> mpsc::UnboundedSender<StoreWrite> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StoreWrite>();
    tokio::spawn(async move {
        while let Some(write) = rx.recv().await {
            let kind = write.kind();
            let result = match write {
                StoreWrite::Player(view) => store.save_player(view).await,
                StoreWrite::Room(snapshot) => store.save_room(snapshot).await,
                StoreWrite::Payment(payment) => store.save_payment(payment).await,
            };
            if let Err(e) = result {
                warn!(%room_id, record = kind, error = %e, "failed to persist record");
            }
        }
        debug!(%room_id, "room writer finished");
    });
    tx
}

impl RoomActor {
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room actor started");

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Flow::Stop = self.handle(cmd) {
                        break;
                    }
                }
                tick = self.game.scheduler.wait_for_draw() => {
                    debug!(room_id = %self.room_id, draw = tick.draw, late = tick.late, "draw timer fired");
                    if let Err(e) = self.guarded(None, RoomGame::auto_draw) {
                        debug!(room_id = %self.room_id, error = %e, "automatic draw skipped");
                    }
                }
            }
        }

        self.game.scheduler.stop();
        info!(room_id = %self.room_id, state = %self.game.state(), "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join { req, origin, reply } => {
                let result = self.guarded(origin.as_ref(), |game| game.join(req));
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                player_id,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.leave(player_id));
                let _ = reply.send(result);
            }
            RoomCommand::Start {
                admin_id,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.start(admin_id));
                let _ = reply.send(result);
            }
            RoomCommand::CallNumber {
                admin_id,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.call_number(admin_id));
                let _ = reply.send(result);
            }
            RoomCommand::Mark {
                player_id,
                number,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.mark(player_id, number));
                let _ = reply.send(result);
            }
            RoomCommand::Claim {
                player_id,
                pattern,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.claim(player_id, pattern));
                let _ = reply.send(result);
            }
            RoomCommand::SetCallMode {
                admin_id,
                mode,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.set_call_mode(admin_id, mode));
                let _ = reply.send(result);
            }
            RoomCommand::End {
                admin_id,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.end(admin_id));
                let _ = reply.send(result);
            }
            RoomCommand::Withdraw {
                player_id,
                amount,
                origin,
                reply,
            } => {
                let result = self.guarded(origin.as_ref(), |game| game.withdraw(player_id, amount));
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.game.snapshot()));
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(Ok(self.game.info()));
            }
            RoomCommand::Archive { reply } => {
                let result = self.guarded(None, RoomGame::archive);
                let stop = result.is_ok();
                let _ = reply.send(result);
                if stop {
                    return Flow::Stop;
                }
            }
            #[cfg(test)]
            RoomCommand::Fault { reply } => {
                let result = self.guarded(None, |_| -> Result<(), RoomError> {
                    panic!("injected fault")
                });
                let _ = reply.send(result);
            }
        }
        Flow::Continue
    }

    /// Runs one operation on the game, then carries out its effects.
    ///
    /// A panic inside `op` ends the room with `InternalError` instead of
    /// taking the actor down.
    fn guarded<T>(
        &mut self,
        origin: Option<&Origin>,
        op: impl FnOnce(&mut RoomGame) -> Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let game = &mut self.game;
        match panic::catch_unwind(AssertUnwindSafe(|| op(game))) {
            Ok(Ok(value)) => {
                let effects = self.game.take_effects();
                self.apply(effects, origin);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.game.discard_effects();
                debug!(room_id = %self.room_id, error = %e, "command rejected");
                Err(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(room_id = %self.room_id, %message, "room command panicked");
                self.game.fail();
                let effects = self.game.take_effects();
                self.apply(effects, None);
                Err(RoomError::Internal(message))
            }
        }
    }

    fn apply(&self, effects: Vec<Effect>, origin: Option<&Origin>) {
        let registry = self.bus.registry();
        for effect in effects {
            match effect {
                Effect::Publish(Audience::Room, event) => {
                    self.bus.publish(self.room_id, &event, origin);
                }
                Effect::Publish(Audience::Player(player), event) => {
                    self.bus.publish_to_player(self.room_id, player, &event, origin);
                }
                Effect::Publish(Audience::Origin, event) => {
                    if let Some(o) = origin {
                        if let Err(e) = self.bus.send_to(o.conn, event, o.request_id.clone()) {
                            debug!(room_id = %self.room_id, error = %e, "origin unreachable");
                        }
                    }
                }
                Effect::BindOrigin => {
                    if let Some(o) = origin {
                        if let Err(e) = registry.bind(o.conn, self.room_id) {
                            warn!(room_id = %self.room_id, error = %e, "could not subscribe joining connection");
                        }
                    }
                }
                Effect::Unbind(player) => registry.unbind_player(player, self.room_id),
                Effect::UnbindAll => registry.unbind_room(self.room_id),
                Effect::SavePlayer(view) => self.persist(StoreWrite::Player(view)),
                Effect::SaveRoom(snapshot) => self.persist(StoreWrite::Room(snapshot)),
                Effect::SavePayment(payment) => self.persist(StoreWrite::Payment(payment)),
            }
        }
    }

    fn persist(&self, write: StoreWrite) {
        if let Err(e) = self.writer.send(write) {
            warn!(room_id = %self.room_id, record = e.0.kind(), "room writer gone, record dropped");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "room panicked".to_string()
    }
}

/// Opens `game` and spawns its actor.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(
    mut game: RoomGame,
    bus: BroadcastBus,
    store: Arc<dyn Persistence>,
    channel_size: usize,
    origin: Option<&Origin>,
) -> Result<(RoomHandle, RoomSnapshot), RoomError> {
    let room_id = game.id();
    let snapshot = game.open()?;
    let (tx, rx) = mpsc::channel(channel_size);
    let mut actor = RoomActor {
        room_id,
        game,
        bus,
        writer: spawn_writer(room_id, store),
        receiver: rx,
    };
    let effects = actor.game.take_effects();
    actor.apply(effects, origin);
    tokio::spawn(actor.run());

    Ok((
        RoomHandle {
            room_id,
            sender: tx,
        },
        snapshot,
    ))
}
