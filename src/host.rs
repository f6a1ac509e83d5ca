/*
 *  host.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Wires a face runtime from the resolved configuration
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::info;
use std::sync::Arc;

use crate::config::Config;
use crate::display::{FaceSurface, FrameCanvas, SurfaceCapabilities};
use crate::error::FaceError;
use crate::provider::HttpDataProvider;
use crate::runtime::{Clock, FaceHandle, FaceRuntime};
use crate::token::{CompanionNode, LocalTokenChannel};

/// A face ready to run, plus the geometry of the surface it draws on.
pub struct HostedFace {
    pub runtime: FaceRuntime,
    pub handle: FaceHandle,
    pub capabilities: SurfaceCapabilities,
}

/// Builds the HTTP provider, the in-process companion and the headless
/// canvas described by `cfg`.
pub fn assemble(cfg: &Config, clock: Arc<dyn Clock>) -> Result<HostedFace, FaceError> {
    let face = cfg.face_config()?;

    let (connect_timeout, timeout) = cfg.api_timeouts();
    let provider = HttpDataProvider::new(cfg.api_base_url(), connect_timeout, timeout)?;
    info!("Schedule service at {}", cfg.api_base_url());

    let token_settings = cfg.token_settings();
    let companion = LocalTokenChannel::new();
    match cfg.companion_seed() {
        Some((node, value)) => {
            companion.add_node(
                CompanionNode { id: node.clone(), display_name: "local companion".to_string() },
                &token_settings.capability,
            );
            companion.put_token(&node, &token_settings, &value);
            info!("Companion '{}' seeded with a token", node);
        }
        None => info!("No token configured; schedule polling waits for one"),
    }

    let (width, height, round) = cfg.display_geometry();
    let canvas = FrameCanvas::new(width, height, round)?.with_snapshot(cfg.snapshot_path());
    let capabilities = canvas.capabilities();
    info!(
        "Canvas {}x{} ({})",
        capabilities.width,
        capabilities.height,
        if capabilities.round { "round" } else { "square" }
    );

    let (runtime, handle) = FaceRuntime::new(
        face,
        token_settings,
        Arc::new(provider),
        Arc::new(companion),
        Box::new(canvas),
        clock,
    );
    Ok(HostedFace { runtime, handle, capabilities })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplayConfig, FaceSection};
    use crate::runtime::SystemClock;

    #[test]
    fn test_default_config_assembles() {
        let hosted = assemble(&Config::default(), Arc::new(SystemClock)).unwrap();
        assert_eq!((hosted.capabilities.width, hosted.capabilities.height), (454, 454));
        assert!(hosted.capabilities.round);
        assert!(!hosted.handle.is_closed());
    }

    #[test]
    fn test_bad_face_section_is_a_config_error() {
        let cfg = Config {
            face: Some(FaceSection { default_school_end: Some("late".into()), ..Default::default() }),
            ..Default::default()
        };
        let err = assemble(&cfg, Arc::new(SystemClock)).err().unwrap();
        assert!(matches!(err, FaceError::Config(_)));
    }

    #[test]
    fn test_empty_canvas_is_a_display_error() {
        let cfg = Config {
            display: Some(DisplayConfig { width: Some(0), ..Default::default() }),
            ..Default::default()
        };
        let err = assemble(&cfg, Arc::new(SystemClock)).err().unwrap();
        assert!(matches!(err, FaceError::Display(_)));
    }
}
