//! Running engine handle and the editor API
//!
//! The poll driver runs in its own tokio task. Editors talk to it through an
//! [`EditorClient`], which turns every call into an [`EditorCommand`] carrying
//! a oneshot reply channel.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::driver::{Idle, PollDriver};
use super::error::EngineError;
use crate::controller::{ButtonType, DeviceId, StickSide, TriggerSide};
use crate::mapping::{ButtonMapping, MappingError, StickMapping, TriggerMapping};
use crate::persistence::KnownDevice;

const COMMAND_QUEUE: usize = 100;

/// Requests served by the poll loop between ticks
#[derive(Debug)]
pub enum EditorCommand {
    GetStick {
        device: DeviceId,
        side: StickSide,
        response_tx: oneshot::Sender<Result<StickMapping, MappingError>>,
    },
    SetStick {
        device: DeviceId,
        side: StickSide,
        mapping: StickMapping,
        response_tx: oneshot::Sender<Result<(), MappingError>>,
    },
    GetButton {
        device: DeviceId,
        button: ButtonType,
        response_tx: oneshot::Sender<Result<ButtonMapping, MappingError>>,
    },
    SetButton {
        device: DeviceId,
        button: ButtonType,
        mapping: ButtonMapping,
        response_tx: oneshot::Sender<Result<(), MappingError>>,
    },
    GetTrigger {
        device: DeviceId,
        side: TriggerSide,
        response_tx: oneshot::Sender<Result<TriggerMapping, MappingError>>,
    },
    SetTrigger {
        device: DeviceId,
        side: TriggerSide,
        mapping: TriggerMapping,
        response_tx: oneshot::Sender<Result<(), MappingError>>,
    },
    /// `None` drops every cached record
    InvalidateCache {
        device: Option<DeviceId>,
        response_tx: oneshot::Sender<()>,
    },
    ConnectedDevices {
        response_tx: oneshot::Sender<Vec<(DeviceId, String)>>,
    },
    KnownDevices {
        response_tx: oneshot::Sender<BTreeMap<DeviceId, KnownDevice>>,
    },
}

/// Handle for the poll driver running in a tokio task
#[derive(Debug)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EditorCommand>,

    task_handle: Option<JoinHandle<Result<(), EngineError>>>,

    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl EngineHandle {
    /// Start `driver` and spawn its poll loop
    pub fn spawn(driver: PollDriver<Idle>, poll_interval: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let running = driver.start();

        let task_handle = tokio::spawn(async move {
            match running
                .run_until_shutdown(poll_interval, command_rx, shutdown_rx)
                .await
            {
                Ok(_stopped) => {
                    info!("Poll driver stopped");
                    Ok(())
                }
                Err(e) => {
                    error!("Poll driver stopped with error: {}", e);
                    Err(e)
                }
            }
        });

        Self {
            command_tx,
            task_handle: Some(task_handle),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn client(&self) -> EditorClient {
        EditorClient {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Stop the poll loop and wait for it to release everything
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        debug!("Sending shutdown signal to poll driver");

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Poll driver task already terminated");
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Poll driver task panicked: {}", e);
                    Err(EngineError::Task(format!("Poll driver task panicked: {}", e)))
                }
            }
        } else {
            debug!("Poll driver already shut down");
            Ok(())
        }
    }
}

/// Async editor API. Cheap to clone; every clone talks to the same engine.
#[derive(Clone, Debug)]
pub struct EditorClient {
    command_tx: mpsc::Sender<EditorCommand>,
}

impl EditorClient {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EditorCommand,
    ) -> Result<T, EngineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|e| EngineError::ChannelError(format!("Engine not running: {}", e)))?;
        response_rx
            .await
            .map_err(|e| EngineError::ChannelError(format!("No reply from engine: {}", e)))
    }

    pub async fn get_stick_mapping(
        &self,
        device: &DeviceId,
        side: StickSide,
    ) -> Result<StickMapping, EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::GetStick {
                device,
                side,
                response_tx,
            })
            .await??)
    }

    pub async fn set_stick_mapping(
        &self,
        device: &DeviceId,
        side: StickSide,
        mapping: StickMapping,
    ) -> Result<(), EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::SetStick {
                device,
                side,
                mapping,
                response_tx,
            })
            .await??)
    }

    pub async fn get_button_mapping(
        &self,
        device: &DeviceId,
        button: ButtonType,
    ) -> Result<ButtonMapping, EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::GetButton {
                device,
                button,
                response_tx,
            })
            .await??)
    }

    pub async fn set_button_mapping(
        &self,
        device: &DeviceId,
        button: ButtonType,
        mapping: ButtonMapping,
    ) -> Result<(), EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::SetButton {
                device,
                button,
                mapping,
                response_tx,
            })
            .await??)
    }

    pub async fn get_trigger_mapping(
        &self,
        device: &DeviceId,
        side: TriggerSide,
    ) -> Result<TriggerMapping, EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::GetTrigger {
                device,
                side,
                response_tx,
            })
            .await??)
    }

    pub async fn set_trigger_mapping(
        &self,
        device: &DeviceId,
        side: TriggerSide,
        mapping: TriggerMapping,
    ) -> Result<(), EngineError> {
        let device = device.clone();
        Ok(self
            .request(|response_tx| EditorCommand::SetTrigger {
                device,
                side,
                mapping,
                response_tx,
            })
            .await??)
    }

    pub async fn invalidate_cache(&self, device: Option<&DeviceId>) -> Result<(), EngineError> {
        let device = device.cloned();
        self.request(|response_tx| EditorCommand::InvalidateCache {
            device,
            response_tx,
        })
        .await
    }

    pub async fn connected_devices(&self) -> Result<Vec<(DeviceId, String)>, EngineError> {
        self.request(|response_tx| EditorCommand::ConnectedDevices { response_tx })
            .await
    }

    pub async fn known_devices(&self) -> Result<BTreeMap<DeviceId, KnownDevice>, EngineError> {
        self.request(|response_tx| EditorCommand::KnownDevices { response_tx })
            .await
    }
}
