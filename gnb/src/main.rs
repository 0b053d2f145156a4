//! UCI gNodeB Main Application
//!
//! Runs the MAC uplink control path against a slot clock: PDSCH feedback is
//! scheduled on the downlink slots, the UL TTI requests are answered by the
//! simulated UEs and their UCI is fed back into the MAC.

mod config;
mod ue_sim;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::time;
use common::types::{Rnti, SlotTime};
use config::{GnbConfig, SimulationConfig};
use layers::mac::{CellContext, MacLayer, MacPhyInterface};
use layers::LayerError;
use ue_sim::UeSimulator;

/// UCI gNodeB
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (.yaml or .toml)
    #[arg(short, long, default_value = "gnb/config/uci_gnb.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error), overrides the configuration file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Frames to run, 0 runs until interrupted
    #[arg(long)]
    frames: Option<u32>,

    /// Slot duration in microseconds, 0 runs unpaced
    #[arg(long)]
    slot_us: Option<u64>,
}

/// Everything the slot loop needs
struct SlotLoop {
    mac: Arc<MacLayer>,
    cell: CellContext,
    ues: Vec<(Rnti, u16)>,
    sim: UeSimulator,
    config: SimulationConfig,
    running: Arc<RwLock<bool>>,
}

impl SlotLoop {
    async fn run(mut self) -> Result<()> {
        let slots_per_frame = self.cell.slots_per_frame();
        let total_slots = self.config.num_frames as u64 * slots_per_frame as u64;
        let slot_us = self
            .config
            .slot_duration_us
            .unwrap_or_else(|| time::slot_duration_us(self.cell.config.scs) as u64);
        let mut interval = (slot_us > 0).then(|| tokio::time::interval(Duration::from_micros(slot_us)));

        let mut now = SlotTime::new(0, 0);
        let mut dl_slots = 0u64;
        let mut elapsed = 0u64;

        while *self.running.read().await {
            match interval.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => tokio::task::yield_now().await,
            }

            if self.cell.frame.is_dl_slot(now.slot) {
                if dl_slots % self.config.dl_period_slots as u64 == 0 {
                    self.schedule_pdsch(now).await?;
                }
                dl_slots += 1;
            }

            let request = self.mac.slot_indication(now).await?;
            if !request.pdus.is_empty() {
                let uci = self.sim.respond(&request);
                let applied = self.mac.uci_indication(now, uci).await?;
                trace!("{}: {} PUCCH PDUs, {} UCI PDUs applied", now, request.pdus.len(), applied);
            }

            now = now.advance(1, slots_per_frame);
            elapsed += 1;
            if total_slots != 0 && elapsed >= total_slots {
                info!("{} frames done", self.config.num_frames);
                break;
            }
        }
        Ok(())
    }

    /// One PDSCH to every UE, with the PUCCH occasion for its HARQ feedback
    async fn schedule_pdsch(&self, now: SlotTime) -> Result<()> {
        for &(rnti, beam) in self.ues.iter() {
            match self.mac.schedule_dl_feedback(rnti, now, beam, None, false).await {
                Ok(Some(feedback)) => trace!(
                    "{}: PDSCH to {} on HARQ {} (k1 {}, retx {})",
                    now,
                    rnti,
                    feedback.pid.value(),
                    feedback.timing_indicator,
                    feedback.retransmission
                ),
                Ok(None) => debug!("{}: no PUCCH occasion for UE {}", now, rnti),
                Err(LayerError::ResourceUnavailable(reason)) => debug!("{}: UE {}: {}", now, rnti, reason),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn report_stats(mac: Arc<MacLayer>, running: Arc<RwLock<bool>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    while *running.read().await {
        interval.tick().await;

        info!("MAC Statistics:");
        for (rnti, stats) in mac.ue_stats().await {
            let rsrp = if stats.num_rsrp_meas > 0 {
                format!("{:.1} dBm", stats.cumul_rsrp as f64 / stats.num_rsrp_meas as f64)
            } else {
                "n/a".to_string()
            };
            info!(
                "  UE {}: SR {}, DTX {}, HARQ errors {}, PUCCH dropped {}, CSI {}/{} dropped, RSRP {}",
                rnti,
                stats.sr_received,
                stats.pucch0_dtx,
                stats.dl_harq_errors,
                stats.pucch_dropped,
                stats.csi_reports_dropped,
                stats.csi_reports_decoded + stats.csi_reports_dropped,
                rsrp
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GnbConfig::from_file(&args.config)?;
    if let Some(frames) = args.frames {
        config.simulation.num_frames = frames;
    }
    if let Some(slot_us) = args.slot_us {
        config.simulation.slot_duration_us = Some(slot_us);
    }

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting UCI gNodeB");
    info!("Configuration file: {}", args.config);
    info!("Cell configuration:");
    info!("  Cell ID: {}", config.cell.cell_id.0);
    info!("  Subcarrier spacing: {:?}", config.cell.scs);
    match &config.cell.tdd {
        Some(tdd) => info!(
            "  TDD: period {} slots, {} DL, {} UL",
            tdd.period_slots, tdd.dl_slots, tdd.ul_slots
        ),
        None => info!("  FDD"),
    }
    info!("  NTN K-offset: {} slots", config.cell.ntn_koffset);

    let cell = CellContext::new(config.cell.clone())?;

    // Initialize MAC layer
    let mut mac_layer = MacLayer::new(config.cell.clone())?;
    mac_layer.initialize().await?;
    for ue in config.ues.iter() {
        mac_layer.add_ue(ue.clone()).await?;
        info!("UE {} admitted on beam {}", ue.rnti, ue.beam_index);
    }
    let mac_layer = Arc::new(mac_layer);

    let running = Arc::new(RwLock::new(true));
    let sim = UeSimulator::new(config.simulation.clone(), &config.ues, cell.slots_per_frame());

    let slot_loop = SlotLoop {
        mac: mac_layer.clone(),
        ues: config.ues.iter().map(|ue| (ue.rnti, ue.beam_index)).collect(),
        cell,
        sim,
        config: config.simulation.clone(),
        running: running.clone(),
    };
    let mut slot_handle = tokio::spawn(slot_loop.run());

    let stats_handle = tokio::spawn(report_stats(
        mac_layer.clone(),
        running.clone(),
        Duration::from_secs(config.simulation.stats_interval_s.max(1)),
    ));

    info!("GNodeB initialized successfully");

    // Wait for shutdown signal or the end of the run
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut slot_handle => {
            match result {
                Ok(Ok(())) => info!("Slot loop finished"),
                Ok(Err(e)) => error!("Slot loop failed: {}", e),
                Err(e) => error!("Slot loop task failed: {}", e),
            }
        }
    }

    // Shutdown
    info!("Shutting down GNodeB");
    *running.write().await = false;

    if !slot_handle.is_finished() {
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut slot_handle).await;
    }
    stats_handle.abort();
    let _ = stats_handle.await;

    for (rnti, stats) in mac_layer.ue_stats().await {
        info!("UE {} final statistics: {}", rnti, serde_json::to_string(&stats)?);
    }

    match Arc::try_unwrap(mac_layer) {
        Ok(mut mac_layer) => mac_layer.shutdown().await?,
        Err(_) => warn!("MAC layer still in use at shutdown"),
    }

    info!("GNodeB shutdown complete");
    Ok(())
}
