//! Parlando Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, oeffnet die
//! Audio-Geraete und fuehrt ein Gespraech bis Ctrl-C oder `/ende`.

use anyhow::{Context, Result};
use parlando_audio::{ausgabegeraet_laden, eingabegeraet_laden, LautsprecherAusgabe, MikrofonStream};
use parlando_client::logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
use parlando_client::{ausfuehren, verbinden, Befehl, ClientConfig, Eingaenge, TerminalSink};
use parlando_conversation::{Dispatcher, Gespraech};
use parlando_core::types::SessionId;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("PARLANDO_CONFIG").unwrap_or_else(|_| "parlando.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);
    if !log_level_gueltig(&config.logging.level) || !log_format_gueltig(&config.logging.format) {
        tracing::warn!(
            level = %config.logging.level,
            format = %config.logging.format,
            "Ungueltige Logging-Einstellungen, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        url = %config.verbindung.url,
        "Parlando Client wird initialisiert"
    );

    // Lautsprecher (Uhr fuer den Wiedergabe-Scheduler)
    let ausgabegeraet = ausgabegeraet_laden(config.geraete.ausgabe.as_deref())?;
    let lautsprecher = LautsprecherAusgabe::oeffnen(&ausgabegeraet)?;
    tracing::info!(
        geraet = lautsprecher.sample_rate(),
        payload = config.wiedergabe.sample_rate,
        "Lautsprecher bereit"
    );
    let mut gespraech = Gespraech::neu(config.gespraech(), TerminalSink::stdout(), lautsprecher);

    let (kanal, mut rahmen) = verbinden(&config.verbindung.url)
        .await
        .with_context(|| format!("Pipeline unter {} nicht erreichbar", config.verbindung.url))?;

    gespraech.starten(
        Box::new(kanal),
        SessionId::zufaellig(),
        config.verbindung.schluessel.clone(),
        Instant::now(),
    )?;

    // Mikrofon erst nach dem Start: Verweigerung fuehrt die Session nach Idle
    let mikrofon = eingabegeraet_laden(config.geraete.eingabe.as_deref()).and_then(|geraet| {
        MikrofonStream::oeffnen(
            &geraet,
            config.capture.sample_rate,
            config.capture.sample_rate as usize * 2,
        )
    });
    let mut mikrofon = match mikrofon {
        Ok(m) => m,
        Err(e) => {
            gespraech.mikrofon_verweigert(&e.to_string());
            anyhow::bail!("Mikrofon nicht verfuegbar: {e}");
        }
    };

    // Benutzerbefehle: Ctrl-C und Terminal-Eingabe
    let (befehl_tx, mut befehle) = mpsc::unbounded_channel();
    let ctrl_c_tx = befehl_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c_tx.send(Befehl::Beenden);
        }
    });
    tokio::spawn(async move {
        let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(zeile)) = zeilen.next_line().await {
            let befehl = match zeile.trim() {
                "" => continue,
                "/ende" | "/quit" => Befehl::Beenden,
                text => Befehl::Chat(text.to_owned()),
            };
            if befehl_tx.send(befehl).is_err() {
                break;
            }
        }
    });

    let mut dispatcher = Dispatcher::neu();
    ausfuehren(
        &mut gespraech,
        &mut dispatcher,
        Eingaenge {
            rahmen: &mut rahmen,
            befehle: &mut befehle,
            mikrofon: &mut mikrofon,
            mikrofon_takt: config.geraete.mikrofon_takt(),
        },
    )
    .await;

    tracing::info!("Parlando Client beendet");
    Ok(())
}
