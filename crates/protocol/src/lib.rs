//! parlando-protocol – Nachrichtenformate des Duplex-Kanals
//!
//! Dieses Crate definiert alle JSON-Steuernachrichten in beide Richtungen
//! und die Klassifizierung eingehender WebSocket-Frames.

pub mod control;
pub mod wire;

pub use control::{ClientNachricht, ServerNachricht};
pub use wire::{text_klassifizieren, Ausgehend, Eingehend, WireFehler};
