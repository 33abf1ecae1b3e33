//! Sensor data sources
//!
//! A [`SensorSource`] pushes [`SensorReading`]s into a [`SampleSink`] handed to
//! it by the driver. Sources own their timing; the driver only asks for an
//! interval and later for delivery to start or stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::AttitudeConfig;
use crate::error::{AttitudeError, Result};
use crate::types::SensorReading;

/// Messages consumed by the driver's worker thread
#[derive(Debug)]
pub(crate) enum Message {
    Reading(SensorReading),
    Shutdown,
}

/// Producer end of the driver's sample queue
///
/// Cloneable and `Send`, so a source may deliver from any thread. Once the
/// driver stops, [`deliver`](SampleSink::deliver) rejects every reading.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: Sender<Message>,
    active: Arc<AtomicBool>,
}

impl SampleSink {
    pub(crate) fn new(tx: Sender<Message>, active: Arc<AtomicBool>) -> Self {
        Self { tx, active }
    }

    /// Queue a reading for processing
    ///
    /// Returns `false` if the driver is no longer accepting samples.
    pub fn deliver(&self, reading: SensorReading) -> bool {
        if !self.is_active() {
            return false;
        }
        self.tx.send(Message::Reading(reading)).is_ok()
    }

    /// Whether the driver still accepts readings
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Provider of periodic motion samples
pub trait SensorSource {
    /// Request one reading every `interval`
    fn configure(&mut self, interval: Duration);

    /// Begin delivering readings into `sink`
    fn start_updates(&mut self, sink: SampleSink) -> Result<()>;

    /// Stop delivering readings
    ///
    /// Must not block on an in-flight delivery.
    fn stop_updates(&mut self);
}

/// Plays back recorded readings at the configured interval
///
/// Playback runs on its own thread and ends when the recording is exhausted
/// (unless looping), when [`stop_updates`](SensorSource::stop_updates) is
/// called, or when the sink stops accepting readings.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fused_attitude::{RawSample, ReplaySource, SensorReading};
///
/// let level = RawSample::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0), Vector3::zeros());
/// let source = ReplaySource::new(vec![SensorReading::new(level); 100]).looping(true);
/// assert_eq!(source.len(), 100);
/// ```
#[derive(Debug)]
pub struct ReplaySource {
    readings: Arc<[SensorReading]>,
    interval: Duration,
    looping: bool,
    playback: Option<Playback>,
}

#[derive(Debug)]
struct Playback {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ReplaySource {
    pub fn new(readings: Vec<SensorReading>) -> Self {
        Self {
            readings: readings.into(),
            interval: AttitudeConfig::default().sample_interval(),
            looping: false,
            playback: None,
        }
    }

    /// Restart from the first reading after the last one
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Interval between readings
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the playback thread is still delivering
    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|playback| !playback.handle.is_finished())
    }

    fn halt(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.stop.store(true, Ordering::Release);
        }
    }
}

impl SensorSource for ReplaySource {
    fn configure(&mut self, interval: Duration) {
        debug!(interval_us = interval.as_micros() as u64, "Replay source configured");
        self.interval = interval;
    }

    fn start_updates(&mut self, sink: SampleSink) -> Result<()> {
        self.halt();

        let stop = Arc::new(AtomicBool::new(false));
        let readings = Arc::clone(&self.readings);
        let interval = self.interval;
        let looping = self.looping;
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("replay-source".into())
            .spawn(move || replay(&readings, interval, looping, &thread_stop, &sink))
            .map_err(|e| AttitudeError::SourceUnavailable(e.to_string()))?;

        self.playback = Some(Playback { stop, handle });
        Ok(())
    }

    fn stop_updates(&mut self) {
        self.halt();
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.halt();
    }
}

fn replay(
    readings: &[SensorReading],
    interval: Duration,
    looping: bool,
    stop: &AtomicBool,
    sink: &SampleSink,
) {
    let mut delivered: u64 = 0;
    let mut index = 0;
    let mut deadline = Instant::now();

    while !stop.load(Ordering::Acquire) {
        let reading = match readings.get(index) {
            Some(reading) => reading,
            None if looping && !readings.is_empty() => {
                index = 0;
                continue;
            }
            None => break,
        };

        if !sink.deliver(*reading) {
            break;
        }
        delivered += 1;
        index += 1;

        deadline += interval;
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    debug!(delivered, "Replay finished");
}

#[derive(Debug, Default)]
struct ManualState {
    sink: Option<SampleSink>,
    interval: Duration,
}

/// Source fed by the host application
///
/// Useful when samples arrive through an existing event loop or callback:
/// the host keeps a [`ManualSourceHandle`] and pushes each reading as it
/// arrives.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fused_attitude::{ManualSource, RawSample, SensorReading};
///
/// let source = ManualSource::new();
/// let handle = source.handle();
///
/// // Nothing is subscribed yet, so the reading is rejected
/// let sample = RawSample::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0), Vector3::zeros());
/// assert!(!handle.push(SensorReading::new(sample)));
/// ```
#[derive(Debug, Default)]
pub struct ManualSource {
    shared: Arc<Mutex<ManualState>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used to push readings, cloneable across threads
    pub fn handle(&self) -> ManualSourceHandle {
        ManualSourceHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl SensorSource for ManualSource {
    fn configure(&mut self, interval: Duration) {
        lock(&self.shared).interval = interval;
    }

    fn start_updates(&mut self, sink: SampleSink) -> Result<()> {
        lock(&self.shared).sink = Some(sink);
        Ok(())
    }

    fn stop_updates(&mut self) {
        lock(&self.shared).sink = None;
    }
}

/// Push end of a [`ManualSource`]
#[derive(Debug, Clone)]
pub struct ManualSourceHandle {
    shared: Arc<Mutex<ManualState>>,
}

impl ManualSourceHandle {
    /// Deliver a reading, `false` if no running driver accepted it
    pub fn push(&self, reading: SensorReading) -> bool {
        lock(&self.shared)
            .sink
            .as_ref()
            .is_some_and(|sink| sink.deliver(reading))
    }

    /// Whether a driver is currently subscribed
    pub fn is_subscribed(&self) -> bool {
        lock(&self.shared).sink.is_some()
    }

    /// Interval requested by the driver
    pub fn interval(&self) -> Duration {
        lock(&self.shared).interval
    }
}

fn lock(shared: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSample;
    use nalgebra::Vector3;
    use std::sync::mpsc::{self, Receiver};

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn reading(tag: f32) -> SensorReading {
        SensorReading::new(RawSample::new(
            Vector3::new(tag, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::zeros(),
        ))
    }

    fn test_sink() -> (SampleSink, Arc<AtomicBool>, Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        (SampleSink::new(tx, Arc::clone(&active)), active, rx)
    }

    fn next_tag(rx: &Receiver<Message>) -> f32 {
        match rx.recv_timeout(TIMEOUT).expect("reading should arrive") {
            Message::Reading(reading) => reading.raw.gyroscope.x,
            Message::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn test_sink_rejects_when_inactive() {
        let (sink, active, rx) = test_sink();

        assert!(sink.deliver(reading(1.0)));
        active.store(false, Ordering::Release);
        assert!(!sink.is_active());
        assert!(!sink.deliver(reading(2.0)));

        assert_eq!(next_tag(&rx), 1.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_manual_source_lifecycle() {
        let mut source = ManualSource::new();
        let handle = source.handle();

        source.configure(Duration::from_millis(10));
        assert_eq!(handle.interval(), Duration::from_millis(10));
        assert!(!handle.is_subscribed());
        assert!(!handle.push(reading(0.0)));

        let (sink, _active, rx) = test_sink();
        source.start_updates(sink).unwrap();
        assert!(handle.is_subscribed());
        assert!(handle.push(reading(1.0)));
        assert!(handle.push(reading(2.0)));
        assert_eq!(next_tag(&rx), 1.0);
        assert_eq!(next_tag(&rx), 2.0);

        source.stop_updates();
        assert!(!handle.is_subscribed());
        assert!(!handle.push(reading(3.0)));
    }

    #[test]
    fn test_replay_delivers_in_order_then_finishes() {
        let readings: Vec<_> = (0..5).map(|i| reading(i as f32)).collect();
        let mut source = ReplaySource::new(readings);
        source.configure(Duration::from_millis(1));

        let (sink, _active, rx) = test_sink();
        source.start_updates(sink).unwrap();

        for i in 0..5 {
            assert_eq!(next_tag(&rx), i as f32);
        }

        let started = Instant::now();
        while source.is_playing() && started.elapsed() < TIMEOUT {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!source.is_playing());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replay_looping() {
        let mut source = ReplaySource::new(vec![reading(1.0), reading(2.0)]).looping(true);
        source.configure(Duration::from_millis(1));

        let (sink, active, rx) = test_sink();
        source.start_updates(sink).unwrap();

        let tags: Vec<f32> = (0..5).map(|_| next_tag(&rx)).collect();
        assert_eq!(tags, vec![1.0, 2.0, 1.0, 2.0, 1.0]);

        // A rejecting sink also ends playback
        active.store(false, Ordering::Release);
        let started = Instant::now();
        while source.is_playing() && started.elapsed() < TIMEOUT {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!source.is_playing());
    }

    #[test]
    fn test_replay_stop_updates() {
        let readings: Vec<_> = (0..100).map(|i| reading(i as f32)).collect();
        let mut source = ReplaySource::new(readings);
        source.configure(Duration::from_millis(50));

        let (sink, _active, rx) = test_sink();
        source.start_updates(sink).unwrap();
        assert_eq!(next_tag(&rx), 0.0);

        source.stop_updates();
        assert!(!source.is_playing());
        thread::sleep(Duration::from_millis(200));

        // At most one reading may already have been in flight
        assert!(rx.try_iter().count() <= 1);
    }

    #[test]
    fn test_empty_replay() {
        let mut source = ReplaySource::new(Vec::new()).looping(true);
        assert!(source.is_empty());

        let (sink, _active, rx) = test_sink();
        source.start_updates(sink).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
