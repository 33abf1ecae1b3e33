//! Attitude driver: serialized sample processing and dispatch
//!
//! The driver owns the configuration, the fusion engine and the sensor
//! source. While running, the engine and the consumer live on a single
//! worker thread that drains the sample queue in arrival order, so at most
//! one sample is ever inside the pipeline and the engine needs no lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nalgebra::Quaternion;
use tracing::{debug, info, trace, warn};

use crate::config::{AttitudeConfig, InvalidOrientationPolicy};
use crate::engine::FusionEngine;
use crate::error::{AttitudeError, Result};
use crate::euler::{EulerAngles, decompose};
use crate::madgwick::Madgwick;
use crate::source::{Message, SampleSink, SensorSource};
use crate::types::{AttitudeSample, SensorReading};

/// Receiver of processed samples
///
/// Called synchronously on the driver's worker thread, once per sample, in
/// arrival order and never concurrently. Closures taking a
/// `Result<AttitudeSample>` implement it.
pub trait AttitudeConsumer {
    fn on_update(&mut self, update: Result<AttitudeSample>);
}

impl<F> AttitudeConsumer for F
where
    F: FnMut(Result<AttitudeSample>),
{
    fn on_update(&mut self, update: Result<AttitudeSample>) {
        self(update)
    }
}

/// Where the fusion engine currently lives
enum EngineSlot<E> {
    Owned(E),
    Worker(JoinHandle<E>),
}

/// Registration state of a running driver
struct Subscription {
    active: Arc<AtomicBool>,
    tx: Sender<Message>,
}

/// Attitude reporting pipeline
///
/// `Idle` after construction; [`start`](Self::start) subscribes to the
/// source and spawns the worker, [`stop`](Self::stop) returns to `Idle`.
/// The fusion engine keeps its state across stop/start cycles.
///
/// # Example
/// ```
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use nalgebra::Vector3;
/// use fused_attitude::{
///     AttitudeConfig, AttitudeDriver, AttitudeError, AttitudeSample, Madgwick, ManualSource,
///     RawSample, SensorReading,
/// };
///
/// let source = ManualSource::new();
/// let handle = source.handle();
/// let mut driver = AttitudeDriver::<_, Madgwick>::new(AttitudeConfig::default(), source)?;
///
/// let (tx, rx) = mpsc::channel();
/// driver.start(move |update: Result<AttitudeSample, AttitudeError>| {
///     let _ = tx.send(update);
/// })?;
///
/// let level = RawSample::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0), Vector3::zeros());
/// assert!(handle.push(SensorReading::new(level)));
///
/// let sample = rx.recv_timeout(Duration::from_secs(1)).unwrap()?;
/// assert_eq!(sample.sequence, 0);
/// assert!(sample.euler.roll.abs() < 1e-3);
///
/// driver.stop()?;
/// # Ok::<(), fused_attitude::AttitudeError>(())
/// ```
pub struct AttitudeDriver<S: SensorSource, E: FusionEngine + Send + 'static = Madgwick> {
    config: AttitudeConfig,
    source: S,
    engine: Option<EngineSlot<E>>,
    subscription: Option<Subscription>,
    delivered: Arc<AtomicU64>,
}

impl<S: SensorSource, E: FusionEngine + Send + 'static> AttitudeDriver<S, E> {
    /// Create a driver whose engine is built from the configuration
    ///
    /// # Errors
    /// [`AttitudeError::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: AttitudeConfig, source: S) -> Result<Self> {
        config.validate()?;
        let engine = E::new(config.sample_frequency, config.beta);
        Self::with_engine(config, source, engine)
    }

    /// Create a driver around an existing engine
    pub fn with_engine(config: AttitudeConfig, mut source: S, engine: E) -> Result<Self> {
        config.validate()?;

        let interval = config.sample_interval();
        source.configure(interval);
        debug!(
            sample_frequency = config.sample_frequency,
            beta = config.beta,
            interval_us = interval.as_micros() as u64,
            "Attitude driver created"
        );

        Ok(Self {
            config,
            source,
            engine: Some(EngineSlot::Owned(engine)),
            subscription: None,
            delivered: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Subscribe to the source and begin processing samples
    ///
    /// `consumer` is called once per sample, synchronously, on the worker
    /// thread. Calls are strictly serialized and follow arrival order. A
    /// degenerate quaternion reaches it as
    /// `Err(AttitudeError::InvalidOrientation)` unless the configuration
    /// substitutes the identity.
    ///
    /// Readings wait in an unbounded queue while the consumer is busy. The
    /// source is never blocked and no reading is dropped while running, so a
    /// consumer slower than the sample rate makes the queue and the latency
    /// grow. Readings still queued at [`stop`](Self::stop) are discarded.
    ///
    /// After a [`stop`](Self::stop), this waits for the previous worker to
    /// finish its in-flight sample so the engine carries over.
    ///
    /// # Errors
    /// * [`AttitudeError::AlreadyRunning`] if the driver is running; the
    ///   existing subscription is left untouched.
    /// * [`AttitudeError::Io`] if the worker thread cannot be spawned.
    /// * Any error from the source's `start_updates`.
    pub fn start<C>(&mut self, consumer: C) -> Result<()>
    where
        C: AttitudeConsumer + Send + 'static,
    {
        if self.subscription.is_some() {
            return Err(AttitudeError::AlreadyRunning);
        }

        let engine = self.reclaim_engine();
        let active = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let pipeline = Pipeline {
            engine,
            consumer,
            policy: self.config.invalid_orientation,
            active: Arc::clone(&active),
            delivered: Arc::clone(&self.delivered),
        };
        let handle = thread::Builder::new()
            .name("attitude-driver".into())
            .spawn(move || pipeline.run(rx))?;

        let sink = SampleSink::new(tx.clone(), Arc::clone(&active));
        if let Err(e) = self.source.start_updates(sink) {
            active.store(false, Ordering::Release);
            let _ = tx.send(Message::Shutdown);
            self.engine = Some(EngineSlot::Worker(handle));
            return Err(e);
        }

        self.engine = Some(EngineSlot::Worker(handle));
        self.subscription = Some(Subscription { active, tx });
        info!(
            sample_frequency = self.config.sample_frequency,
            "Attitude driver started"
        );
        Ok(())
    }

    /// Unsubscribe from the source
    ///
    /// Returns without waiting for the worker. A sample the worker already
    /// pulled finishes and reaches the consumer; queued samples are dropped
    /// and the sink rejects anything new.
    ///
    /// # Errors
    /// [`AttitudeError::NotRunning`] if the driver is idle. Nothing else
    /// happens in that case.
    pub fn stop(&mut self) -> Result<()> {
        let Some(subscription) = self.subscription.take() else {
            return Err(AttitudeError::NotRunning);
        };

        subscription.active.store(false, Ordering::Release);
        self.source.stop_updates();
        // The worker may already be gone if its consumer panicked
        let _ = subscription.tx.send(Message::Shutdown);

        info!(
            samples = self.delivered.load(Ordering::Relaxed),
            "Attitude driver stopped"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn config(&self) -> &AttitudeConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of samples handed to consumers since construction
    pub fn samples_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    /// The fusion engine, once no worker holds it
    ///
    /// `None` while running and briefly after [`stop`](Self::stop), until the
    /// worker has finished its last sample. Never blocks.
    pub fn engine(&mut self) -> Option<&E> {
        let finished = matches!(
            &self.engine,
            Some(EngineSlot::Worker(handle)) if handle.is_finished()
        );
        if self.subscription.is_none() && finished {
            let engine = self.reclaim_engine();
            self.engine = Some(EngineSlot::Owned(engine));
        }

        match &self.engine {
            Some(EngineSlot::Owned(engine)) => Some(engine),
            _ => None,
        }
    }

    /// Take the engine back from wherever it is, waiting for a stopped worker
    fn reclaim_engine(&mut self) -> E {
        match self.engine.take() {
            Some(EngineSlot::Owned(engine)) => engine,
            Some(EngineSlot::Worker(handle)) => handle.join().unwrap_or_else(|_| {
                warn!("Attitude worker panicked, rebuilding fusion engine");
                E::new(self.config.sample_frequency, self.config.beta)
            }),
            None => {
                warn!("Fusion engine was lost, rebuilding");
                E::new(self.config.sample_frequency, self.config.beta)
            }
        }
    }
}

impl<S: SensorSource, E: FusionEngine + Send + 'static> Drop for AttitudeDriver<S, E> {
    fn drop(&mut self) {
        if self.subscription.is_some() {
            let _ = self.stop();
        }
    }
}

/// State moved onto the worker thread
struct Pipeline<E, C> {
    engine: E,
    consumer: C,
    policy: InvalidOrientationPolicy,
    active: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
}

impl<E, C> Pipeline<E, C>
where
    E: FusionEngine,
    C: AttitudeConsumer,
{
    fn run(mut self, rx: Receiver<Message>) -> E {
        for message in rx.iter() {
            match message {
                Message::Reading(reading) if self.active.load(Ordering::Acquire) => {
                    self.process(reading);
                }
                Message::Reading(_) | Message::Shutdown => break,
            }
        }

        debug!("Attitude worker exiting");
        self.engine
    }

    fn process(&mut self, reading: SensorReading) {
        let raw = reading.raw;

        // Device accelerometers report the reaction to gravity; the engine
        // expects gravity pointing up.
        self.engine
            .update(raw.gyroscope, -raw.accelerometer, raw.magnetometer);

        let (q0, q1, q2, q3) = (
            self.engine.q0(),
            self.engine.q1(),
            self.engine.q2(),
            self.engine.q3(),
        );
        let sequence = self.delivered.load(Ordering::Relaxed);
        let reference = reading.reference.map(EulerAngles::to_degrees);

        let update = match decompose(q0, q1, q2, q3) {
            Ok(angles) => Ok(AttitudeSample {
                sequence,
                raw,
                quaternion: Quaternion::new(q0, q1, q2, q3),
                euler: angles.to_degrees(),
                reference,
            }),
            Err(err) => match self.policy {
                InvalidOrientationPolicy::Report => {
                    warn!(sequence, q0, q1, q2, q3, "Invalid orientation from fusion engine");
                    Err(err)
                }
                InvalidOrientationPolicy::SubstituteIdentity => {
                    warn!(sequence, q0, q1, q2, q3, "Invalid orientation, substituting identity");
                    Ok(AttitudeSample {
                        sequence,
                        raw,
                        quaternion: Quaternion::identity(),
                        euler: EulerAngles::default(),
                        reference,
                    })
                }
            },
        };

        if let Ok(sample) = &update {
            trace!(
                sequence,
                roll = sample.euler.roll,
                pitch = sample.euler.pitch,
                yaw = sample.euler.yaw,
                "Attitude sample"
            );
        }

        self.consumer.on_update(update);
        self.delivered.store(sequence + 1, Ordering::Release);
    }
}
