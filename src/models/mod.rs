pub mod profile;
pub mod torrent;
