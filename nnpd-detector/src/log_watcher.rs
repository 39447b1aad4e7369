use nnpd_core::config::{compile_rules, CompiledRule};
use nnpd_core::types::LogWatcherConfig;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One matched log line: the rule name that matched and the original message.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub name: String,
    pub message: String,
}

/// Tagged source selector for the log watcher. Only `journald` exists
/// today; a new backend plugs in by adding a variant and a constructor.
pub enum LogWatcherSource {
    Journald,
}

impl LogWatcherSource {
    pub fn from_str(source: &str) -> Option<Self> {
        match source {
            "journald" => Some(Self::Journald),
            _ => None,
        }
    }
}

/// Start watching one log-watcher config file. Returns a receiver that
/// yields a `LogMessage` for every matching log line; the watcher task
/// runs until the sender side is dropped along with the channel.
pub fn watch(config: LogWatcherConfig) -> nnpd_core::Result<mpsc::Receiver<LogMessage>> {
    let rules = compile_rules(&config)?;
    let (tx, rx) = mpsc::channel(1000);

    match LogWatcherSource::from_str(&config.source) {
        Some(LogWatcherSource::Journald) => {
            tokio::task::spawn_blocking(move || journald_loop(&config.syslog_identifier, &rules, &tx));
        }
        None => {
            return Err(nnpd_core::Error::Config(format!(
                "unsupported log watcher source: {}",
                config.source
            )));
        }
    }

    Ok(rx)
}

fn journald_loop(syslog_identifier: &str, rules: &[CompiledRule], tx: &mpsc::Sender<LogMessage>) {
    let mut journal = match systemd::journal::OpenOptions::default().open() {
        Ok(journal) => journal,
        Err(err) => {
            warn!(error = %err, "failed to open journald reader");
            return;
        }
    };

    if let Err(err) = journal.seek_tail() {
        warn!(error = %err, "failed to seek journal to tail");
        return;
    }
    let _ = journal.previous();

    let match_key = format!("SYSLOG_IDENTIFIER={syslog_identifier}");
    if let Err(err) = journal.match_add("SYSLOG_IDENTIFIER", syslog_identifier) {
        warn!(error = %err, filter = %match_key, "failed to set journald match filter");
        return;
    }

    loop {
        match journal.next() {
            Ok(0) => {
                // no new entries yet; wait for more.
                if journal.wait(std::time::Duration::from_secs(1)).is_err() {
                    return;
                }
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "journald read failed");
                return;
            }
        }

        let Ok(Some(message)) = journal.get_data("MESSAGE") else {
            continue;
        };
        let message = message.to_string_lossy().to_string();

        for rule in rules {
            if rule.pattern.is_match(&message) {
                debug!(rule = %rule.name, "log watcher rule matched");
                if tx
                    .blocking_send(LogMessage {
                        name: rule.name.clone(),
                        message: message.clone(),
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_is_rejected() {
        assert!(LogWatcherSource::from_str("unknown").is_none());
        assert!(LogWatcherSource::from_str("journald").is_some());
    }
}
