//! Command dispatch: bridges CLI args -> device facade -> output formatting.

pub mod devices;
pub mod effects;
pub mod settings;
pub mod site;
pub mod stats;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use nightsync_core::{BusPayload, Controller, Device, StoreName, channel};

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// How much of the controller a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Local stores only; no device is contacted.
    Offline,
    /// Initial fetches plus whatever the command triggers.
    OneShot,
    /// Pollers on, for streaming commands.
    Live,
}

/// A started controller plus the `Error` channel a command watches.
pub struct Context {
    pub controller: Controller,
    /// Device name used in error messages.
    pub label: String,
    pub(crate) errors: mpsc::UnboundedReceiver<BusPayload>,
    wait: Duration,
}

impl Context {
    async fn open(target: Target, mode: Mode) -> Result<Self, CliError> {
        let mut config = target.config;
        if mode != Mode::Live {
            config.poll_effects = false;
            config.poll_statistics = false;
        }
        if mode == Mode::Offline {
            config.device = None;
        }
        let wait = config.request_timeout.saturating_mul(2);

        let controller = Controller::new(config)?;
        let (_id, errors) = controller.bus().listen(channel::ERROR);
        controller.start().await?;

        Ok(Self {
            controller,
            label: target.label,
            errors,
            wait,
        })
    }

    pub fn device(&self, scope: &[StoreName]) -> Device {
        self.controller.device(scope)
    }

    /// First value of a device store.
    ///
    /// Fails fast on the first `Error` notice for that store's endpoint
    /// instead of waiting out the retry loop.
    pub async fn fetch<T>(&mut self, name: StoreName) -> Result<Arc<T>, CliError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let label = name.endpoint().map(|e| e.label);
        let device = self.controller.device(&[name]);
        let wait = device.wait_for::<T>(name, self.wait);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                value = &mut wait => return Ok(value?),
                Some(payload) = self.errors.recv() => {
                    let Some(notice) = payload.as_error() else { continue };
                    if Some(notice.target.as_str()) == label {
                        return Err(CliError::from_notice(&self.label, notice));
                    }
                    tracing::debug!(%notice, "ignoring unrelated error");
                }
            }
        }
    }

    async fn close(self) {
        self.controller.shutdown().await;
    }
}

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let mode = match cmd {
        Command::Site(_) | Command::Devices => Mode::Offline,
        Command::Watch(_) => Mode::Live,
        _ => Mode::OneShot,
    };
    let mut ctx = Context::open(target, mode).await?;

    let result = match cmd {
        Command::Effects => effects::list(&mut ctx, global).await,
        Command::Next => effects::navigate(&ctx, true, global).await,
        Command::Prev => effects::navigate(&ctx, false, global).await,
        Command::Goto { index } => effects::goto(&mut ctx, index, global).await,
        Command::Enable { index } => {
            effects::set_enabled(&mut ctx, index, Some(true), global).await
        }
        Command::Disable { index } => {
            effects::set_enabled(&mut ctx, index, Some(false), global).await
        }
        Command::Toggle { index } => effects::set_enabled(&mut ctx, index, None, global).await,
        Command::Settings => settings::show(&mut ctx, global).await,
        Command::Set { key, value } => settings::set(&mut ctx, &key, &value, global).await,
        Command::Stats => stats::show(&mut ctx, global).await,
        Command::Watch(args) => watch::run(&mut ctx, args, global).await,
        Command::Site(args) => site::handle(&ctx, args, global).await,
        Command::Devices => devices::handle(global),
    };

    ctx.close().await;
    result
}
