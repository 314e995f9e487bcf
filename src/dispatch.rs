//! Synchronization pass: environments onto keys.
//!
//! Environment *i*, in declaration order, is shown on key *i*. Each key's
//! image is resolved and rendered outside the session lock, then pushed
//! under it.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::device::{
    BackgroundWorkers, DeckTransport, DeviceDescriptor, DeviceSession, InputWatcher,
    KeyImageFormat, SessionOptions,
};
use crate::error::{AmbianceError, DeviceError, Result};
use crate::render::{KeyRenderer, NativeKeyImage};
use crate::resolve::ImageResolver;

/// What to do with environments beyond the device's key count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Fail with [`AmbianceError::Capacity`] before touching the device.
    #[default]
    Reject,
    /// Show the first environments that fit and report the rest as skipped.
    Truncate,
}

/// What to do when one key cannot be prepared.
///
/// Device errors always abort; this only covers reference, resolve and
/// render failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFailurePolicy {
    /// Stop the pass at the first failure.
    #[default]
    Abort,
    /// Record the failure and continue with the next key.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Brightness applied after reset (0-100).
    pub brightness: u8,
    pub capacity: CapacityPolicy,
    pub on_failure: KeyFailurePolicy,
    /// Keep the session open this long after the pass, reporting key presses.
    pub hold: Option<Duration>,
    pub session: SessionOptions,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            brightness: 100,
            capacity: CapacityPolicy::default(),
            on_failure: KeyFailurePolicy::default(),
            hold: None,
            session: SessionOptions::default(),
        }
    }
}

/// One environment bound to one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyAssignment {
    pub key: usize,
    /// Registry key of the environment.
    pub environment: String,
    /// Text drawn on the key.
    pub label: String,
    pub icon: String,
}

/// Key assignments for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPlan {
    pub assignments: Vec<KeyAssignment>,
    /// Environments that did not fit, in declaration order.
    pub overflow: Vec<String>,
}

/// Assign environments to keys `0..n` in declaration order.
pub fn assign_keys(config: &Configuration, key_count: u8) -> KeyPlan {
    let mut plan = KeyPlan::default();
    for (index, (id, environment)) in config.environments.iter().enumerate() {
        if index < usize::from(key_count) {
            plan.assignments.push(KeyAssignment {
                key: index,
                environment: id.clone(),
                label: environment.name.clone(),
                icon: environment.icon.clone(),
            });
        } else {
            plan.overflow.push(id.clone());
        }
    }
    plan
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyFailure {
    pub key: usize,
    pub environment: String,
    pub error: String,
}

/// Outcome of a synchronization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub device_id: String,
    pub assigned: Vec<KeyAssignment>,
    pub failed: Vec<KeyFailure>,
    /// Environments left out by [`CapacityPolicy::Truncate`].
    pub skipped: Vec<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Progress notifications emitted during [`Dispatcher::run_observed`].
#[derive(Debug)]
pub enum DispatchEvent<'a> {
    Started { total: usize },
    KeyUpdated { assignment: &'a KeyAssignment },
    KeyFailed { assignment: &'a KeyAssignment, error: &'a AmbianceError },
    Finished,
}

/// Joins every background worker when dropped.
struct DrainOnExit<'a>(&'a BackgroundWorkers);

impl Drop for DrainOnExit<'_> {
    fn drop(&mut self) {
        let joined = self.0.shutdown();
        debug!(joined, "Background workers drained");
    }
}

/// Orchestrates a full synchronization pass.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    pub resolver: ImageResolver,
    pub renderer: KeyRenderer,
    pub options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(resolver: ImageResolver, renderer: KeyRenderer, options: DispatchOptions) -> Self {
        Self {
            resolver,
            renderer,
            options,
        }
    }

    pub fn run(
        &self,
        config: &Configuration,
        transport: &dyn DeckTransport,
        descriptor: &DeviceDescriptor,
        workers: &BackgroundWorkers,
    ) -> Result<SyncReport> {
        self.run_observed(config, transport, descriptor, workers, &mut |_| {})
    }

    /// Run the pass, reporting progress to `observer`.
    ///
    /// The session is closed and `workers` are drained on every path,
    /// including failures.
    #[instrument(skip_all, fields(device = %descriptor.id))]
    pub fn run_observed(
        &self,
        config: &Configuration,
        transport: &dyn DeckTransport,
        descriptor: &DeviceDescriptor,
        workers: &BackgroundWorkers,
        observer: &mut dyn FnMut(&DispatchEvent<'_>),
    ) -> Result<SyncReport> {
        let _drain = DrainOnExit(workers);

        let Some(format) = descriptor.image_format else {
            return Err(DeviceError::NonVisual {
                id: descriptor.id.clone(),
            }
            .into());
        };
        if self.options.brightness > 100 {
            return Err(DeviceError::InvalidBrightness {
                value: self.options.brightness,
            }
            .into());
        }

        let plan = assign_keys(config, descriptor.key_count);
        if !plan.overflow.is_empty() {
            match self.options.capacity {
                CapacityPolicy::Reject => {
                    return Err(AmbianceError::Capacity {
                        environments: config.environments.len(),
                        keys: descriptor.key_count,
                    });
                }
                CapacityPolicy::Truncate => warn!(
                    keys = descriptor.key_count,
                    skipped = ?plan.overflow,
                    "More environments than keys, extra environments are not shown"
                ),
            }
        }

        let session = DeviceSession::open(transport, descriptor, self.options.session)?;
        let outcome = self
            .sync(&session, config, &format, &plan, observer)
            .and_then(|report| self.hold(&session, workers, &plan).map(|()| report));

        match (outcome, session.close()) {
            (Ok(report), Ok(())) => {
                info!(
                    assigned = report.assigned.len(),
                    failed = report.failed.len(),
                    skipped = report.skipped.len(),
                    "Synchronization complete"
                );
                observer(&DispatchEvent::Finished);
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_error)) => {
                warn!(error = %close_error, "Closing the session after a failed pass also failed");
                Err(e)
            }
        }
    }

    fn sync(
        &self,
        session: &DeviceSession,
        config: &Configuration,
        format: &KeyImageFormat,
        plan: &KeyPlan,
        observer: &mut dyn FnMut(&DispatchEvent<'_>),
    ) -> Result<SyncReport> {
        session.scoped_exclusive(|guard| -> Result<()> {
            guard.reset()?;
            guard.set_brightness(self.options.brightness)?;
            Ok(())
        })?;

        let mut report = SyncReport {
            device_id: session.id().to_string(),
            skipped: plan.overflow.clone(),
            ..SyncReport::default()
        };
        observer(&DispatchEvent::Started {
            total: plan.assignments.len(),
        });

        for assignment in &plan.assignments {
            let image = match self.prepare(config, format, assignment) {
                Ok(image) => image,
                Err(error) if self.options.on_failure == KeyFailurePolicy::Skip => {
                    warn!(
                        key = assignment.key,
                        environment = %assignment.environment,
                        error = %error,
                        "Skipping key"
                    );
                    observer(&DispatchEvent::KeyFailed {
                        assignment,
                        error: &error,
                    });
                    report.failed.push(KeyFailure {
                        key: assignment.key,
                        environment: assignment.environment.clone(),
                        error: error.to_string(),
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            session.exclusive()?.update_key(assignment.key, &image)?;
            debug!(
                key = assignment.key,
                environment = %assignment.environment,
                "Key updated"
            );
            observer(&DispatchEvent::KeyUpdated { assignment });
            report.assigned.push(assignment.clone());
        }

        Ok(report)
    }

    /// Resolve and render the image for one key.
    fn prepare(
        &self,
        config: &Configuration,
        format: &KeyImageFormat,
        assignment: &KeyAssignment,
    ) -> Result<NativeKeyImage> {
        let image = config
            .components
            .images
            .get(&assignment.icon)
            .ok_or_else(|| AmbianceError::UnknownReference {
                environment: assignment.environment.clone(),
                key: assignment.icon.clone(),
            })?;
        let resolved = self
            .resolver
            .resolve(image)
            .map_err(|source| AmbianceError::Resolve {
                environment: assignment.environment.clone(),
                source,
            })?;
        self.renderer
            .render(format, &resolved.bytes, &assignment.label)
            .map_err(|source| AmbianceError::Render {
                environment: assignment.environment.clone(),
                source,
            })
    }

    /// Keep the session open for the configured hold, logging key presses.
    fn hold(
        &self,
        session: &DeviceSession,
        workers: &BackgroundWorkers,
        plan: &KeyPlan,
    ) -> Result<()> {
        let Some(hold) = self.options.hold else {
            return Ok(());
        };

        let labels: Vec<String> = plan.assignments.iter().map(|a| a.environment.clone()).collect();
        InputWatcher::default().spawn(session, workers, move |event| {
            if event.pressed {
                let environment = labels.get(usize::from(event.key)).map_or("-", String::as_str);
                info!(key = event.key, environment, "Key pressed");
            }
        })?;

        info!(seconds = hold.as_secs_f32(), "Holding session open");
        std::thread::sleep(hold);
        Ok(())
    }
}
