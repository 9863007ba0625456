use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

#[path = "../console.rs"]
mod console;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use pump_core::config::ControllerConfig;
use pump_core::control::OperatingMode;
use pump_core::protection::ProtectionLevel;
use session::Session;

const TRANSCRIPT_DIR: &str = "target/transcripts";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scenario {
    Overcurrent,
    Pressure,
    Slave,
    Safety,
}

impl Scenario {
    const ALL: [Self; 4] = [Self::Overcurrent, Self::Pressure, Self::Slave, Self::Safety];

    fn tag(self) -> &'static str {
        match self {
            Self::Overcurrent => "overcurrent",
            Self::Pressure => "pressure",
            Self::Slave => "slave",
            Self::Safety => "safety",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| format!("Unknown scenario `{tag}`"))
    }

    fn script(self) -> &'static [&'static str] {
        match self {
            Self::Overcurrent => &[
                "pressure 0.5",
                "step 1s",
                "current 32",
                "step 2s",
                "current 41",
                "step 1s",
                "current 46",
                "step 1s",
                "current 20",
                "step 1s",
                "events",
                "report",
            ],
            Self::Pressure => &[
                "pressure 0.1",
                "step 2s",
                "status",
                "pressure 0.3",
                "step 10s",
                "status",
                "pressure 0.5",
                "step 10s",
                "status",
            ],
            Self::Slave => &[
                "pressure 0.1",
                "step 1s",
                "pwm 20 60",
                "step 500ms",
                "pwm 50 30",
                "step 1s",
                "pwm off",
                "step 1s",
                "events",
            ],
            Self::Safety => &[
                "pressure 0.5",
                "step 1s",
                "safety on",
                "step",
                "step 500ms",
                "safety off",
                "step",
                "events",
            ],
        }
    }

    fn verify(self, session: &Session) -> Result<(), String> {
        let snapshot = session
            .last_snapshot()
            .ok_or_else(|| "no cycles were run".to_string())?;
        let controller = session.controller();
        match self {
            Self::Overcurrent => {
                expect(
                    snapshot.current_level == ProtectionLevel::Normal,
                    "current protection did not recover to NORMAL",
                )?;
                expect(
                    controller.current_protection().fault_count() == 2,
                    "expected two fault entries (FAULT and EMERGENCY)",
                )
            }
            Self::Pressure => expect(
                snapshot.target_fraction == controller.config().pressure.percent_max,
                "output did not saturate above the high setpoint",
            ),
            Self::Slave => {
                expect(
                    snapshot.mode == OperatingMode::Local,
                    "did not fall back to local mode after the signal was lost",
                )?;
                expect(
                    controller.decoder().accepted_cycles() > 0,
                    "no command cycle was ever accepted",
                )
            }
            Self::Safety => expect(
                snapshot.mode == OperatingMode::Local && !snapshot.safety_active,
                "did not resume local mode after safety release",
            ),
        }
    }
}

fn expect(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

fn main() -> io::Result<()> {
    let scenarios = parse_scenarios().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: replay_scenario [overcurrent|pressure|slave|safety]...");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut failures = 0;

    for scenario in scenarios {
        let path = PathBuf::from(TRANSCRIPT_DIR).join(format!("{}.log", scenario.tag()));
        let header = format!("Pump emulator {} scenario", scenario.tag());
        let mut session = Session::new(ControllerConfig::DEFAULT)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?
            .with_transcript(&path, &header)?;

        writeln!(writer, "== {} ==", scenario.tag())?;
        for line in scenario.script() {
            writeln!(writer, "> {line}")?;
            for response in session.handle_command(line)? {
                writeln!(writer, "{response}")?;
            }
        }

        match scenario.verify(&session) {
            Ok(()) => writeln!(writer, "PASS {} ({})", scenario.tag(), path.display())?,
            Err(reason) => {
                failures += 1;
                writeln!(writer, "FAIL {}: {reason}", scenario.tag())?;
            }
        }
    }

    if failures > 0 {
        process::exit(1);
    }
    Ok(())
}

fn parse_scenarios() -> Result<Vec<Scenario>, String> {
    let tags: Vec<String> = env::args().skip(1).collect();
    if tags.is_empty() {
        return Ok(Scenario::ALL.to_vec());
    }
    tags.iter().map(|tag| Scenario::from_tag(tag)).collect()
}
