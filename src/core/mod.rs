//! Core state model: ids, players, board, session, configuration, time.
//!
//! Everything peers replicate is reachable from `Session`. The rest of the
//! crate only ever transforms one `Session` value into another.

pub mod entity;
pub mod player;
pub mod board;
pub mod state;
pub mod config;
pub mod rng;
pub mod time;

pub use entity::{CardId, CardIdAllocator};
pub use player::{Player, PlayerId, PrivateZone, ZoneSizes};
pub use board::{Board, CellPos};
pub use state::{CardLocation, Phase, Session, SessionId};
pub use config::SyncConfig;
pub use rng::SessionRng;
pub use time::Timestamp;
