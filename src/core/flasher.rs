//! Session request interface
//!
//! [`Flasher`] is what callers use to start sessions. It owns the tool
//! runner and settings, and refuses to start a second session on a port
//! that already has one running.

use super::observer::SessionObserver;
use super::plan::FlashPlan;
use super::ports::PortRegistry;
use super::session::{FlashSession, SessionResult};
use super::settings::Settings;
use crate::error::FlashError;
use crate::infra::process::{probe_tool, EsptoolRunner, ToolProbe, ToolRunner};

/// Starts flash, erase and read-info sessions
#[derive(Debug, Clone)]
pub struct Flasher<R: ToolRunner> {
    runner: R,
    settings: Settings,
    ports: PortRegistry,
}

impl Flasher<EsptoolRunner> {
    /// Flasher running the tool configured in `settings`
    pub fn from_settings(settings: Settings) -> Self {
        let runner = EsptoolRunner::new(settings.program(), settings.program_args());
        Self::new(runner, settings)
    }
}

impl<R: ToolRunner> Flasher<R> {
    pub fn new(runner: R, settings: Settings) -> Self {
        Self {
            runner,
            settings,
            ports: PortRegistry::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Registry shared by every session this flasher starts
    pub fn ports(&self) -> &PortRegistry {
        &self.ports
    }

    /// Write `plan` to the board on `port`
    ///
    /// Only fails with `Err` when the session could not start; every
    /// outcome of a started session is a [`SessionResult`].
    pub async fn flash<O>(
        &self,
        port: &str,
        plan: FlashPlan,
        observer: &O,
    ) -> Result<SessionResult, FlashError>
    where
        O: SessionObserver + ?Sized,
    {
        let _guard = self.ports.acquire(port)?;
        let session = FlashSession::flash(&self.runner, &self.settings, observer, port, plan);
        Ok(session.run().await)
    }

    /// Erase the whole flash of the board on `port`
    pub async fn erase<O>(
        &self,
        port: &str,
        observer: &O,
    ) -> Result<SessionResult, FlashError>
    where
        O: SessionObserver + ?Sized,
    {
        let _guard = self.ports.acquire(port)?;
        let session = FlashSession::erase(&self.runner, &self.settings, observer, port);
        Ok(session.run().await)
    }

    /// Read chip and flash information from the board on `port`
    pub async fn read_info<O>(
        &self,
        port: &str,
        observer: &O,
    ) -> Result<SessionResult, FlashError>
    where
        O: SessionObserver + ?Sized,
    {
        let _guard = self.ports.acquire(port)?;
        let session = FlashSession::read_info(&self.runner, &self.settings, observer, port);
        Ok(session.run().await)
    }

    /// Check that the flashing tool is installed and answers
    pub async fn probe(&self) -> ToolProbe {
        probe_tool(&self.runner, self.settings.probe_timeout()).await
    }
}
