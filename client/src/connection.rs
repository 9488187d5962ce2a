//! WebSocket-Verbindung zur Sprach-Pipeline
//!
//! Der Stream wird in Lese- und Schreibhaelfte geteilt:
//!
//! ```text
//! WsKanal::steuerung_senden / frame_senden
//!     -> mpsc (Ausgehend) -> Schreib-Task -> WebSocket
//! WebSocket -> Lese-Task -> mpsc (Rahmen) -> Treiber -> Dispatcher
//! ```
//!
//! Der Gespraechs-Kern sieht nur den synchronen [`Kanal`].

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parlando_conversation::{Kanal, KanalFehler, Rahmen};
use parlando_protocol::{Ausgehend, ClientNachricht};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Fehler beim Verbindungsaufbau
#[derive(Debug, Error)]
pub enum VerbindungsFehler {
    #[error("WebSocket-Verbindung fehlgeschlagen: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// ---------------------------------------------------------------------------
// WsKanal
// ---------------------------------------------------------------------------

/// Sendeseite der WebSocket-Verbindung
pub struct WsKanal {
    tx: Option<mpsc::UnboundedSender<Ausgehend>>,
    offen: Arc<AtomicBool>,
}

impl WsKanal {
    fn einreihen(&mut self, ausgehend: Ausgehend) -> Result<(), KanalFehler> {
        if !self.ist_offen() {
            return Err(KanalFehler::Geschlossen);
        }
        let tx = self.tx.as_ref().ok_or(KanalFehler::Geschlossen)?;
        tx.send(ausgehend).map_err(|_| KanalFehler::Geschlossen)
    }
}

impl Kanal for WsKanal {
    fn steuerung_senden(&mut self, nachricht: &ClientNachricht) -> Result<(), KanalFehler> {
        self.einreihen(Ausgehend::Steuerung(nachricht.clone()))
    }

    fn frame_senden(&mut self, frame: Bytes) -> Result<(), KanalFehler> {
        self.einreihen(Ausgehend::Audio(frame))
    }

    fn ist_offen(&self) -> bool {
        self.offen.load(Ordering::Acquire) && self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn schliessen(&mut self) {
        self.offen.store(false, Ordering::Release);
        // Schreib-Task sendet Close, sobald der Sender weg ist
        self.tx = None;
    }
}

// ---------------------------------------------------------------------------
// Verbindungsaufbau
// ---------------------------------------------------------------------------

/// Baut die WebSocket-Verbindung auf und startet Lese- und Schreib-Task
///
/// Gibt den Kanal fuer den Gespraechs-Kern und den Empfaenger fuer
/// eingehende Rahmen zurueck.
pub async fn verbinden(
    url: &str,
) -> Result<(WsKanal, mpsc::UnboundedReceiver<Rahmen>), VerbindungsFehler> {
    tracing::info!(url, "Verbinde mit Sprach-Pipeline");
    let (ws, antwort) = tokio_tungstenite::connect_async(url).await?;
    tracing::info!(status = %antwort.status(), "WebSocket-Verbindung hergestellt");

    let (mut schreiber, mut leser) = ws.split();
    let (aus_tx, mut aus_rx) = mpsc::unbounded_channel::<Ausgehend>();
    let (ein_tx, ein_rx) = mpsc::unbounded_channel::<Rahmen>();
    let offen = Arc::new(AtomicBool::new(true));

    // Schreib-Task
    let offen_schreiber = Arc::clone(&offen);
    tokio::spawn(async move {
        while let Some(ausgehend) = aus_rx.recv().await {
            let nachricht = match ausgehend {
                Ausgehend::Steuerung(n) => match n.to_json() {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::warn!(typ = n.typ(), fehler = %e, "Nachricht nicht serialisierbar");
                        continue;
                    }
                },
                Ausgehend::Audio(frame) => Message::Binary(frame.to_vec()),
            };
            if let Err(e) = schreiber.send(nachricht).await {
                tracing::warn!(fehler = %e, "Senden fehlgeschlagen");
                offen_schreiber.store(false, Ordering::Release);
                break;
            }
        }
        let _ = schreiber.close().await;
        tracing::debug!("Schreib-Task beendet");
    });

    // Lese-Task
    let offen_leser = Arc::clone(&offen);
    tokio::spawn(async move {
        let abschluss = loop {
            let rahmen = match leser.next().await {
                Some(Ok(Message::Text(text))) => Rahmen::Text(text),
                Some(Ok(Message::Binary(daten))) => Rahmen::Binaer(Bytes::from(daten)),
                Some(Ok(Message::Close(frame))) => {
                    break Rahmen::Geschlossen(
                        frame.map(|f| format!("{} {}", u16::from(f.code), f.reason)),
                    )
                }
                // Ping/Pong beantwortet tungstenite selbst
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Rahmen::Fehler(e.to_string()),
                None => break Rahmen::Geschlossen(None),
            };
            if ein_tx.send(rahmen).is_err() {
                return;
            }
        };
        offen_leser.store(false, Ordering::Release);
        let _ = ein_tx.send(abschluss);
        tracing::debug!("Lese-Task beendet");
    });

    Ok((
        WsKanal {
            tx: Some(aus_tx),
            offen,
        },
        ein_rx,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn nachrichten_in_beide_richtungen() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let adresse = listener.local_addr().unwrap();

        let gegenstelle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let erste = ws.next().await.unwrap().unwrap();
            let zweite = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(r#"{"type":"pong"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![9, 9])).await.unwrap();
            ws.close(None).await.unwrap();
            (erste, zweite)
        });

        let (mut kanal, mut rx) = verbinden(&format!("ws://{adresse}")).await.unwrap();
        assert!(kanal.ist_offen());
        kanal.steuerung_senden(&ClientNachricht::Ping).unwrap();
        kanal
            .frame_senden(Bytes::from_static(&[1, 0, 2, 0]))
            .unwrap();

        assert_eq!(rx.recv().await, Some(Rahmen::Text(r#"{"type":"pong"}"#.into())));
        assert_eq!(
            rx.recv().await,
            Some(Rahmen::Binaer(Bytes::from_static(&[9, 9])))
        );
        assert!(matches!(rx.recv().await, Some(Rahmen::Geschlossen(_))));
        assert!(!kanal.ist_offen());
        assert!(matches!(
            kanal.steuerung_senden(&ClientNachricht::Ping),
            Err(KanalFehler::Geschlossen)
        ));

        let (erste, zweite) = gegenstelle.await.unwrap();
        assert_eq!(erste, Message::Text(r#"{"type":"ping"}"#.into()));
        assert_eq!(zweite, Message::Binary(vec![1, 0, 2, 0]));
    }

    #[tokio::test]
    async fn schliessen_sperrt_senden() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let adresse = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (mut kanal, _rx) = verbinden(&format!("ws://{adresse}")).await.unwrap();
        kanal.schliessen();
        assert!(!kanal.ist_offen());
        assert!(kanal.frame_senden(Bytes::from_static(&[0, 0])).is_err());
    }

    #[tokio::test]
    async fn verbindung_abgelehnt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let adresse = listener.local_addr().unwrap();
        drop(listener);
        assert!(verbinden(&format!("ws://{adresse}")).await.is_err());
    }
}
