//! parlando-client – Terminal-Client fuer Sprachgespraeche
//!
//! Verbindet den Gespraechs-Kern mit einer WebSocket-Verbindung, dem
//! Terminal und (Feature `geraete`) Mikrofon und Lautsprecher.

pub mod config;
pub mod connection;
pub mod logging;
pub mod sink;
pub mod treiber;

pub use config::ClientConfig;
pub use connection::{verbinden, VerbindungsFehler, WsKanal};
pub use sink::TerminalSink;
pub use treiber::{ausfuehren, Befehl, Eingaenge, KeineQuelle, SampleQuelle};
