//! Interactive JSON-lines session.

use std::io::{BufRead, Write};

use arena_core::math::millis;
use arena_core::simulation::Simulation;
use tracing::{debug, info, warn};

use crate::protocol::{Command, ProtocolError, Response, StateSnapshot};

/// Session options.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessConfig {
    /// Output state after every `tick` (vs only on query).
    pub auto_state_output: bool,
}

/// Headless runner for externally controlled play.
#[derive(Debug)]
pub struct HeadlessRunner {
    sim: Simulation,
    config: HeadlessConfig,
}

impl HeadlessRunner {
    /// Wrap a ready simulation.
    pub fn new(sim: Simulation, config: HeadlessConfig) -> Self {
        Self { sim, config }
    }

    /// The simulation being driven.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Read commands until `quit` or end of input, writing one or more
    /// responses per command.
    ///
    /// Malformed lines are answered with an `error` response and the
    /// session continues; only IO failures end it early.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), ProtocolError> {
        info!("Starting interactive session");
        send(&mut output, &Response::ready(&self.sim))?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "Rejected command line");
                    send(&mut output, &Response::error(e.to_string(), None))?;
                    continue;
                }
            };

            debug!(cmd = command.name(), "Command received");
            let quit = command == Command::Quit;
            for response in self.handle(command) {
                send(&mut output, &response)?;
            }
            if quit {
                info!(tick = self.sim.tick_count(), "Session ended by controller");
                return Ok(());
            }
        }

        info!(tick = self.sim.tick_count(), "Input closed");
        Ok(())
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        match command {
            Command::Tick {
                count,
                frame_ms,
                input,
            } => {
                if frame_ms == 0 {
                    return vec![Response::error("frame_ms must be positive", Some("tick"))];
                }
                let frame_time = millis(i64::from(frame_ms));
                let mut events = Vec::new();
                for _ in 0..count {
                    events.extend(self.sim.tick(frame_time, &input).events);
                }
                let mut responses = vec![Response::Events {
                    tick: self.sim.tick_count(),
                    events,
                }];
                if self.config.auto_state_output {
                    responses.push(self.state());
                }
                responses
            }
            Command::Query => vec![self.state()],
            Command::Pause => {
                self.sim.set_paused(true);
                vec![self.state()]
            }
            Command::Resume => {
                self.sim.set_paused(false);
                vec![self.state()]
            }
            Command::Difficulty { level } => {
                self.sim.set_difficulty(level);
                vec![self.state()]
            }
            Command::Hash => vec![Response::StateHash {
                tick: self.sim.tick_count(),
                hash: self.sim.state_hash(),
            }],
            Command::Quit => vec![Response::Bye],
        }
    }

    fn state(&self) -> Response {
        Response::State(StateSnapshot::capture(&self.sim))
    }
}

fn send<W: Write>(output: &mut W, response: &Response) -> Result<(), ProtocolError> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::config::Difficulty;
    use arena_test_utils::fixtures::{arena_sim, config};

    fn session(script: &str) -> (HeadlessRunner, Vec<serde_json::Value>) {
        let mut runner = HeadlessRunner::new(arena_sim(config(1, Difficulty::Easy)), HeadlessConfig::default());
        let mut out = Vec::new();
        runner.run(script.as_bytes(), &mut out).expect("in-memory IO");
        let lines = String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        (runner, lines)
    }

    #[test]
    fn test_ready_then_bye() {
        let (_, lines) = session("{\"cmd\":\"quit\"}\n{\"cmd\":\"query\"}\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "ready");
        assert_eq!(lines[0]["width"], 9);
        assert_eq!(lines[1]["type"], "bye");
    }

    #[test]
    fn test_tick_reports_events() {
        let script = r#"{"cmd":"tick","count":4,"frame_ms":250}
{"cmd":"tick","input":{"players":[{"place_hazard":true},{}]}}
"#;
        let (runner, lines) = session(script);
        assert_eq!(lines[1]["type"], "events");
        assert_eq!(lines[1]["tick"], 4);
        assert_eq!(lines[2]["events"][0]["event"], "hazard_placed");
        assert_eq!(runner.simulation().tick_count(), 5);
    }

    #[test]
    fn test_bad_lines_do_not_end_session() {
        let (_, lines) = session("not json\n\n{\"cmd\":\"teleport\"}\n{\"cmd\":\"hash\"}\n");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1]["type"], "error");
        assert_eq!(lines[2]["type"], "error");
        assert_eq!(lines[3]["type"], "state_hash");
    }

    #[test]
    fn test_pause_blocks_ticks() {
        let mut runner = HeadlessRunner::new(arena_sim(config(1, Difficulty::Easy)), HeadlessConfig::default());
        runner.handle(Command::Pause);
        let before = runner.simulation().state_hash();
        let responses = runner.handle(Command::Tick {
            count: 10,
            frame_ms: 100,
            input: Default::default(),
        });
        assert_eq!(responses, vec![Response::Events { tick: 0, events: vec![] }]);
        assert_eq!(runner.simulation().state_hash(), before);

        let responses = runner.handle(Command::Resume);
        assert!(matches!(&responses[0], Response::State(s) if !s.paused));
    }

    #[test]
    fn test_difficulty_and_zero_frame_time() {
        let mut runner = HeadlessRunner::new(
            arena_sim(config(1, Difficulty::Easy)),
            HeadlessConfig {
                auto_state_output: true,
            },
        );
        let responses = runner.handle(Command::Difficulty {
            level: Difficulty::Hard,
        });
        assert!(matches!(&responses[0], Response::State(s) if s.difficulty == Difficulty::Hard));

        let responses = runner.handle(Command::Tick {
            count: 1,
            frame_ms: 0,
            input: Default::default(),
        });
        assert!(matches!(&responses[0], Response::Error { .. }));

        let responses = runner.handle(Command::Tick {
            count: 1,
            frame_ms: 16,
            input: Default::default(),
        });
        assert_eq!(responses.len(), 2);
        assert!(matches!(&responses[0], Response::Events { tick: 1, .. }));
        assert!(matches!(&responses[1], Response::State(s) if s.tick == 1));
    }
}
