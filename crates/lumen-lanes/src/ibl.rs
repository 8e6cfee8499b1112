// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives the external processor that bakes image-based lighting maps.

use lumen_core::renderer::api::TextureId;
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError};
use lumen_data::scene::{IblStages, ImageBasedLighting};

/// Renders one IBL map.
///
/// Implementations live outside the renderer; they receive the texture the
/// stage derives from and return the texture they rendered into.
pub trait IblProcessor {
    /// Records the work for `stage`. `input` is the source panorama for the
    /// environment stage and the environment cube map for the others.
    fn render(
        &mut self,
        stage: IblStages,
        input: TextureId,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<TextureId, RenderError>;
}

const STAGE_ORDER: [IblStages; 4] = [
    IblStages::ENVIRONMENT,
    IblStages::IRRADIANCE,
    IblStages::SPECULAR,
    IblStages::BRDF_LOOKUP,
];

/// Renders every pending stage of `ibl`, environment first.
///
/// Returns the stages that were rendered. A stage that fails stays pending
/// and the error is returned; stages completed before it are kept.
pub fn process_pending_ibl(
    ibl: &mut ImageBasedLighting,
    processor: &mut dyn IblProcessor,
    device: &dyn GraphicsDevice,
    encoder: &mut dyn CommandEncoder,
) -> Result<IblStages, RenderError> {
    let mut rendered = IblStages::empty();
    for stage in STAGE_ORDER {
        if !ibl.is_rendering_required(stage) {
            continue;
        }
        let input = if stage == IblStages::ENVIRONMENT {
            ibl.source()
        } else {
            match ibl.environment_map() {
                Some(environment) => environment,
                None => {
                    return Err(RenderError::Internal(format!(
                        "IBL stage {stage:?} needs an environment map"
                    )))
                }
            }
        };
        let texture = processor.render(stage, input, device, encoder)?;
        ibl.complete(stage, texture);
        rendered |= stage;
    }
    if !rendered.is_empty() {
        log::debug!("Rendered IBL stages {rendered:?}");
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_infra::HeadlessDevice;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(IblStages, TextureId)>,
        next: usize,
    }

    impl IblProcessor for Recorder {
        fn render(
            &mut self,
            stage: IblStages,
            input: TextureId,
            _device: &dyn GraphicsDevice,
            _encoder: &mut dyn CommandEncoder,
        ) -> Result<TextureId, RenderError> {
            self.calls.push((stage, input));
            self.next += 1;
            Ok(TextureId(500 + self.next))
        }
    }

    #[test]
    fn stages_run_in_dependency_order() {
        let device = HeadlessDevice::new();
        let mut encoder = device.create_command_encoder(None);
        let mut ibl = ImageBasedLighting::new(TextureId(7));
        let mut processor = Recorder::default();

        let rendered =
            process_pending_ibl(&mut ibl, &mut processor, &device, encoder.as_mut()).unwrap();
        assert_eq!(rendered, IblStages::all());
        assert_eq!(
            processor.calls,
            vec![
                (IblStages::ENVIRONMENT, TextureId(7)),
                (IblStages::IRRADIANCE, TextureId(501)),
                (IblStages::SPECULAR, TextureId(501)),
                (IblStages::BRDF_LOOKUP, TextureId(501)),
            ]
        );
        assert_eq!(ibl.maps().unwrap().brdf_lookup, TextureId(504));
    }

    #[test]
    fn only_stale_stages_rerun() {
        let device = HeadlessDevice::new();
        let mut encoder = device.create_command_encoder(None);
        let mut ibl = ImageBasedLighting::new(TextureId(7));
        let mut processor = Recorder::default();
        process_pending_ibl(&mut ibl, &mut processor, &device, encoder.as_mut()).unwrap();

        ibl.set_source(TextureId(8));
        let rendered =
            process_pending_ibl(&mut ibl, &mut processor, &device, encoder.as_mut()).unwrap();
        assert!(!rendered.contains(IblStages::BRDF_LOOKUP));
        assert_eq!(processor.calls.len(), 7);
        assert!(ibl.maps().is_some());
    }
}
