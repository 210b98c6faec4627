//! Screening service.
//!
//! Wires the lifecycle, coordinator, harvesters and telephony adapter
//! together over a platform, and routes device events to them.

use crate::call_control::{select_terminator, CallControl};
use crate::config::Config;
use crate::coordinator::{BlockSink, ScreeningCoordinator, ScreeningStatus};
use crate::harvest::caller_id::CallerIdHarvester;
use crate::harvest::screen_scan::ScreenScanHarvester;
use crate::harvest::{ScreenReader, ScreenTextHarvester};
use crate::lifecycle::CallLifecycle;
use crate::ringer::RingerDevice;
use crate::telephony::TelephonyAdapter;
use crate::types::{SurfaceChanged, TelephonyEvent};
use screening_store::KeywordStore;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Platform surfaces the engine drives
#[derive(Clone)]
pub struct Platform {
    pub ringer: Arc<dyn RingerDevice>,
    pub call_control: Arc<dyn CallControl>,
    pub screen: Arc<dyn ScreenReader>,
}

/// Anything the platform can tell the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Telephony(TelephonyEvent),
    Surface(SurfaceChanged),
}

pub struct ScreeningService {
    enabled: bool,
    coordinator: Arc<ScreeningCoordinator>,
    telephony: TelephonyAdapter,
    harvesters: Vec<Arc<dyn ScreenTextHarvester>>,
}

impl ScreeningService {
    pub fn new(
        config: &Config,
        platform: Platform,
        keywords: Arc<Mutex<KeywordStore>>,
        block_sink: Arc<dyn BlockSink>,
    ) -> Self {
        let lifecycle = Arc::new(CallLifecycle::new());
        let terminator = select_terminator(platform.call_control);
        let coordinator = Arc::new(ScreeningCoordinator::new(
            lifecycle,
            platform.ringer,
            terminator,
            block_sink,
            config.timing.ceiling(),
        ));

        let mut harvesters: Vec<Arc<dyn ScreenTextHarvester>> = vec![Arc::new(
            ScreenScanHarvester::new(Arc::clone(&coordinator), Arc::clone(&platform.screen), config),
        )];
        if config.harvest.vendor_enabled {
            harvesters.push(Arc::new(CallerIdHarvester::new(
                Arc::clone(&coordinator),
                Arc::clone(&platform.screen),
                config,
            )));
        }

        let telephony = TelephonyAdapter::new(Arc::clone(&coordinator), harvesters.clone(), keywords);

        info!(
            "Screening service ready: harvesters [{}], terminator {}",
            harvesters
                .iter()
                .map(|h| h.name())
                .collect::<Vec<_>>()
                .join(", "),
            coordinator.terminator_name()
        );

        Self {
            enabled: config.general.enabled,
            coordinator,
            telephony,
            harvesters,
        }
    }

    pub async fn handle(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Telephony(event) => {
                // Idle is always processed so a call started before disabling still ends cleanly
                if !self.enabled && event != TelephonyEvent::CallEnded {
                    debug!("Screening disabled, ignoring {:?}", event);
                    return;
                }
                self.telephony.handle(event).await;
            }
            DeviceEvent::Surface(event) => {
                for harvester in &self.harvesters {
                    harvester.on_surface_changed(&event).await;
                }
            }
        }
    }

    /// Process events until every sender is dropped
    pub async fn run(&self, mut events: mpsc::Receiver<DeviceEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Device event stream closed");
    }

    pub fn status(&self) -> ScreeningStatus {
        self.coordinator.status()
    }

    pub fn coordinator(&self) -> &Arc<ScreeningCoordinator> {
        &self.coordinator
    }

    pub fn lifecycle(&self) -> &Arc<CallLifecycle> {
        self.coordinator.lifecycle()
    }

    pub fn harvester_names(&self) -> Vec<&'static str> {
        self.harvesters.iter().map(|h| h.name()).collect()
    }
}
