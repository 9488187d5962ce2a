//! parlando-conversation – Gespraechs-Kern
//!
//! Turn-Taking-Zustandsmaschine, Message-Dispatcher und Verlauf. Der Kern
//! ist headless: Transport, UI und Audio-Ausgabe werden ueber Traits
//! injiziert, Zeit wird explizit uebergeben.

pub mod config;
pub mod dispatcher;
pub mod history;
pub mod kanal;
pub mod state;

pub use config::{GespraechConfig, ZeitgeberConfig};
pub use dispatcher::{Dispatcher, DispatcherStatistik, Rahmen};
pub use history::Verlauf;
pub use kanal::{Kanal, KanalFehler};
pub use state::Gespraech;
