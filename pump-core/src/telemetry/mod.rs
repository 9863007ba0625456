//! Telemetry event catalog and the in-memory event ring.
//!
//! Every discrete change the controller makes (protection level entries and
//! exits, operating mode changes, command signal acquired or lost) is stored
//! as a [`TelemetryRecord`] in a fixed-size ring so hosts and the firmware log
//! task can drain it without allocation. Event kinds map to compact numeric
//! codes for transport over diagnostics channels.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::control::OperatingMode;
use crate::protection::{LevelTransition, ProtectionLevel, VoltageLevel};
use crate::time::Ticks;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    CurrentLevel(ProtectionLevel),
    VoltageLevel(VoltageLevel),
    ModeChanged(OperatingMode),
    SignalAcquired,
    SignalLost,
    Custom(u16),
}

impl TelemetryEventKind {
    const CURRENT_LEVEL_BASE: u16 = 0x0000;
    const VOLTAGE_LEVEL_BASE: u16 = 0x0010;
    const MODE_BASE: u16 = 0x0020;
    const SIGNAL_ACQUIRED_CODE: u16 = 0x0030;
    const SIGNAL_LOST_CODE: u16 = 0x0031;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::CurrentLevel(level) => Self::CURRENT_LEVEL_BASE + level as u16,
            Self::VoltageLevel(level) => Self::VOLTAGE_LEVEL_BASE + level as u16,
            Self::ModeChanged(mode) => Self::MODE_BASE + mode as u16,
            Self::SignalAcquired => Self::SIGNAL_ACQUIRED_CODE,
            Self::SignalLost => Self::SIGNAL_LOST_CODE,
            Self::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let offset = usize::from(code & 0x000F);
        match code & 0xFFF0 {
            Self::CURRENT_LEVEL_BASE => ProtectionLevel::ALL
                .get(offset)
                .map_or(Self::Custom(code), |level| Self::CurrentLevel(*level)),
            Self::VOLTAGE_LEVEL_BASE => VoltageLevel::ALL
                .get(offset)
                .map_or(Self::Custom(code), |level| Self::VoltageLevel(*level)),
            Self::MODE_BASE => OperatingMode::ALL
                .get(offset)
                .map_or(Self::Custom(code), |mode| Self::ModeChanged(*mode)),
            _ if code == Self::SIGNAL_ACQUIRED_CODE => Self::SignalAcquired,
            _ if code == Self::SIGNAL_LOST_CODE => Self::SignalLost,
            _ => Self::Custom(code),
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentLevel(level) => write!(f, "current-level {level}"),
            Self::VoltageLevel(level) => write!(f, "voltage-level {level}"),
            Self::ModeChanged(mode) => write!(f, "mode {mode}"),
            Self::SignalAcquired => f.write_str("signal-acquired"),
            Self::SignalLost => f.write_str("signal-lost"),
            Self::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryPayload {
    None,
    Current(LevelTransition<ProtectionLevel>),
    Voltage(LevelTransition<VoltageLevel>),
    Mode(ModeTelemetry),
    Signal(SignalTelemetry),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeTelemetry {
    pub previous: OperatingMode,
    pub time_in_previous: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignalTelemetry {
    pub frequency_hz: f32,
    pub duty: f32,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Ticks,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} @{} {}", self.id, self.timestamp.raw(), self.event)?;
        match self.details {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Current(t) => write!(
                f,
                " from {} at {:.1}A after {}ms",
                t.from,
                t.measurement,
                t.elapsed.as_millis()
            ),
            TelemetryPayload::Voltage(t) => write!(
                f,
                " from {} at {:.2}V after {}ms",
                t.from,
                t.measurement,
                t.elapsed.as_millis()
            ),
            TelemetryPayload::Mode(m) => write!(
                f,
                " from {} after {}ms",
                m.previous,
                m.time_in_previous.as_millis()
            ),
            TelemetryPayload::Signal(s) => {
                write!(f, " {:.2}Hz duty {:.1}%", s.frequency_hz, s.duty * 100.0)
            }
        }
    }
}

pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next record will receive; callers use it as a drain cursor.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records newer than `cursor`, oldest first.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(cursor) < EventId::MAX / 2)
    }

    pub fn record_current_transition(
        &mut self,
        transition: LevelTransition<ProtectionLevel>,
    ) -> EventId {
        self.record(
            TelemetryEventKind::CurrentLevel(transition.to),
            TelemetryPayload::Current(transition),
            transition.at,
        )
    }

    pub fn record_voltage_transition(
        &mut self,
        transition: LevelTransition<VoltageLevel>,
    ) -> EventId {
        self.record(
            TelemetryEventKind::VoltageLevel(transition.to),
            TelemetryPayload::Voltage(transition),
            transition.at,
        )
    }

    pub fn record_mode_change(
        &mut self,
        previous: OperatingMode,
        next: OperatingMode,
        time_in_previous: Duration,
        timestamp: Ticks,
    ) -> EventId {
        self.record(
            TelemetryEventKind::ModeChanged(next),
            TelemetryPayload::Mode(ModeTelemetry {
                previous,
                time_in_previous,
            }),
            timestamp,
        )
    }

    pub fn record_signal(
        &mut self,
        acquired: bool,
        details: SignalTelemetry,
        timestamp: Ticks,
    ) -> EventId {
        let event = if acquired {
            TelemetryEventKind::SignalAcquired
        } else {
            TelemetryEventKind::SignalLost
        };
        self.record(event, TelemetryPayload::Signal(details), timestamp)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: Ticks,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
