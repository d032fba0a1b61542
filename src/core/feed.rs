//! Host event feed.
//!
//! The game client appends one JSON object per line to a feed file. The
//! bridge tails it and turns every complete line into a [`HostEvent`] on the
//! trigger queue.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::client::ClientSnapshot;
use super::config::ConfigChange;
use super::coordinator::CoordinatorEvent;
use super::error::{BridgeError, Result};
use super::model::{GameState, PlayerView, Skill};

pub const FEED_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Replaces the whole live state
    Snapshot(ClientSnapshot),
    GameStateChanged {
        state: GameState,
    },
    PlayerSpawned {
        #[serde(default)]
        player: Option<PlayerView>,
    },
    StatChanged {
        skill: Skill,
        xp: i32,
        #[serde(default)]
        boosted_level: Option<i32>,
        #[serde(default)]
        real_level: Option<i32>,
    },
    GameTick,
    ConfigChanged(ConfigChange),
}

pub fn parse_line(line: &str) -> Result<HostEvent> {
    serde_json::from_str(line).map_err(|e| BridgeError::FeedParse {
        line: line.to_string(),
        details: e.to_string(),
    })
}

/// Follows an append-only file and hands out complete lines.
pub struct FeedTailer {
    file: File,
    position: u64,
    path: PathBuf,
}

impl FeedTailer {
    /// Opens at end of file; only lines appended afterwards are read.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        let position = file.metadata()?.len();
        Ok(Self {
            file,
            position,
            path: path_ref.to_path_buf(),
        })
    }

    /// Opens at the start of the file.
    pub fn open_from_start(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut tailer = Self::open(path)?;
        tailer.rewind()?;
        Ok(tailer)
    }

    /// Lines completed since the last call. A trailing partial line stays
    /// unread until its newline arrives.
    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let len = self.file.metadata()?.len();
        if len < self.position {
            log::info!("{} was truncated, reading from the start", self.path.display());
            self.position = 0;
        }

        self.file.seek(SeekFrom::Start(self.position))?;
        let mut buffer = Vec::new();
        self.file.read_to_end(&mut buffer)?;

        let Some(last_newline) = buffer.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = &buffer[..=last_newline];
        self.position += complete.len() as u64;

        Ok(String::from_utf8_lossy(complete)
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect())
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.position = 0;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Tails `path` forever, pushing parsed events onto the trigger queue.
///
/// Waits for the file to appear. Returns only when the queue is closed.
pub async fn pump(path: PathBuf, tx: mpsc::Sender<CoordinatorEvent>, poll: Duration) -> Result<()> {
    let mut tailer: Option<FeedTailer> = None;
    let mut waiting_logged = false;
    let mut missing_at_start = !path.exists();

    loop {
        if tailer.is_none() {
            let opened = if missing_at_start {
                FeedTailer::open_from_start(&path)
            } else {
                FeedTailer::open(&path)
            };
            match opened {
                Ok(t) => {
                    log::info!("Tailing host feed {}", path.display());
                    tailer = Some(t);
                    waiting_logged = false;
                }
                Err(e) => {
                    if !waiting_logged {
                        log::info!("Waiting for host feed {}: {}", path.display(), e);
                        waiting_logged = true;
                    }
                    missing_at_start = true;
                }
            }
        }

        if let Some(t) = tailer.as_mut() {
            match t.read_new_lines() {
                Ok(lines) => {
                    for line in lines {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parse_line(line) {
                            Ok(event) => {
                                if tx.send(CoordinatorEvent::Host(event)).await.is_err() {
                                    return Err(BridgeError::ChannelClosed { component: "feed" });
                                }
                            }
                            Err(e) => log::warn!("Skipping feed line: {}", e),
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Lost host feed {}: {}", t.path().display(), e);
                    tailer = None;
                    missing_at_start = true;
                }
            }
        }

        if tx.is_closed() {
            return Err(BridgeError::ChannelClosed { component: "feed" });
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(parse_line(r#"{"type":"game_tick"}"#).unwrap(), HostEvent::GameTick);
        assert_eq!(
            parse_line(r#"{"type":"game_state_changed","state":"LOGIN_SCREEN"}"#).unwrap(),
            HostEvent::GameStateChanged {
                state: GameState::LoginScreen
            }
        );
        assert_eq!(
            parse_line(r#"{"type":"stat_changed","skill":"MINING","xp":1200}"#).unwrap(),
            HostEvent::StatChanged {
                skill: Skill::Mining,
                xp: 1200,
                boosted_level: None,
                real_level: None,
            }
        );
        assert_eq!(
            parse_line(r#"{"type":"player_spawned"}"#).unwrap(),
            HostEvent::PlayerSpawned { player: None }
        );

        let change = parse_line(
            r#"{"type":"config_changed","group":"kp_home_assistant","key":"showHealth","value":"true"}"#,
        )
        .unwrap();
        assert_eq!(change, HostEvent::ConfigChanged(ConfigChange::new("showHealth", "true")));

        match parse_line(r#"{"type":"snapshot","game_state":"LOGGED_IN","world":301}"#).unwrap() {
            HostEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.game_state, GameState::LoggedIn);
                assert_eq!(snapshot.world, 301);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_line("not json"), Err(BridgeError::FeedParse { .. })));
        assert!(parse_line(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn test_tailer_reads_only_complete_new_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        append(&path, "{\"type\":\"old\"}\n");

        let mut tailer = FeedTailer::open(&path).unwrap();
        assert!(tailer.read_new_lines().unwrap().is_empty());

        append(&path, "{\"type\":\"game_tick\"}\n{\"type\":\"game_");
        assert_eq!(tailer.read_new_lines().unwrap(), vec![r#"{"type":"game_tick"}"#]);

        append(&path, "tick\"}\r\n");
        assert_eq!(tailer.read_new_lines().unwrap(), vec![r#"{"type":"game_tick"}"#]);
    }

    #[test]
    fn test_tailer_restarts_after_truncation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        append(&path, "aaaaaaaaaaaaaaaaaaaa\n");
        let mut tailer = FeedTailer::open(&path).unwrap();

        std::fs::write(&path, "b\n").unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_pump_waits_for_file_and_forwards_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        let (tx, mut rx) = mpsc::channel(8);

        let task = tokio::spawn(pump(path.clone(), tx, Duration::from_millis(5)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        append(&path, "garbage\n{\"type\":\"game_tick\"}\n");
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, CoordinatorEvent::Host(HostEvent::GameTick)));

        drop(rx);
        let result = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(matches!(result, Err(BridgeError::ChannelClosed { .. })));
    }
}
