//! Gespraechsverlauf
//!
//! Geordnete, nur anhaengbare Liste der Turns einer Session. Ein Turn wird
//! nach dem Anhaengen nicht mehr veraendert.

use parlando_core::types::{Sprecher, Turn};

#[derive(Debug, Default, Clone)]
pub struct Verlauf {
    turns: Vec<Turn>,
}

impl Verlauf {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt einen neuen Turn an und gibt ihn zurueck
    pub fn anhaengen(&mut self, sprecher: Sprecher, text: impl Into<String>) -> &Turn {
        self.turns.push(Turn::neu(sprecher, text));
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn letzter(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Verwirft den Verlauf (nur beim Abbau der Session)
    pub(crate) fn leeren(&mut self) {
        self.turns.clear();
    }
}
