//! `roomrelay resolve --aid A --room-id R` – look up the playback URL.

use anyhow::Result;
use roomrelay_core::config::RelayConfig;
use roomrelay_core::resolver::{Lookup, Resolution, RoomInfoLookup};
use roomrelay_core::traffic::IdentifierPair;

pub async fn run_resolve(cfg: &RelayConfig, aid: &str, room_id: &str) -> Result<()> {
    let lookup = RoomInfoLookup::new(&cfg.lookup, cfg.strip_query());
    match lookup.resolve(&IdentifierPair::new(room_id, aid)).await? {
        Resolution::Found(playback) => println!("{}", playback.url),
        Resolution::NotFound => println!("No playback URL found in room info."),
    }
    Ok(())
}
