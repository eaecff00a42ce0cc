//! Built-in CPU ray tracer, the default compute module.

pub mod scene;

use crate::compute::{ComputeLoader, ComputeModule, RawFrame};
use crate::config::{SceneKind, TracerConfig};
use crate::error::{DispatchError, Result};
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use scene::{Camera, CameraSetup, Ray, Scene};

/// Scene and camera built by `init()` and read by every `render()`.
struct TracerContext {
    scene: Scene,
    camera: Camera,
}

pub struct RayTracer {
    config: TracerConfig,
    context: Option<TracerContext>,
}

impl RayTracer {
    pub fn new(config: TracerConfig) -> Self {
        Self {
            config,
            context: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    fn front_view(&self) -> CameraSetup {
        CameraSetup {
            lookfrom: DVec3::new(0.0, 0.5, 4.0),
            lookat: DVec3::new(0.0, 0.0, -3.0),
            vup: DVec3::Y,
            vfov_degrees: 45.0,
            aperture: self.config.aperture,
            focus_distance: self.config.focus_distance,
        }
    }
}

impl ComputeModule for RayTracer {
    fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        let aspect = f64::from(self.config.width) / f64::from(self.config.height);
        let (scene, setup) = match self.config.scene {
            SceneKind::ThreeSpheres => (Scene::three_spheres(), self.front_view()),
            SceneKind::GlassSpheres => (Scene::glass_spheres(), self.front_view()),
            SceneKind::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
                rng.set_stream(1);
                let setup = CameraSetup {
                    lookfrom: DVec3::new(13.0, 2.0, 3.0),
                    lookat: DVec3::ZERO,
                    vfov_degrees: 20.0,
                    ..self.front_view()
                };
                (Scene::random(&mut rng), setup)
            }
        };
        self.context = Some(TracerContext {
            scene,
            camera: Camera::new(setup, aspect),
        });
        log::debug!(
            "tracer initialized: {:?} at {}x{}, {} spp",
            self.config.scene,
            self.config.width,
            self.config.height,
            self.config.samples_per_pixel
        );
        Ok(())
    }

    fn render(&mut self) -> Result<RawFrame> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| DispatchError::render_failure("tracer used before init"))?;
        let TracerConfig {
            width,
            height,
            samples_per_pixel,
            max_depth,
            seed,
            ..
        } = self.config;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut total_rays = 0u64;
        let mut pixels = Vec::with_capacity(4 * width as usize * height as usize);
        let scale = 1.0 / f64::from(samples_per_pixel);

        for row in 0..height {
            let y = height - 1 - row;
            for x in 0..width {
                let mut color = DVec3::ZERO;
                for _ in 0..samples_per_pixel {
                    let s = (f64::from(x) + rng.gen::<f64>()) / f64::from(width);
                    let t = (f64::from(y) + rng.gen::<f64>()) / f64::from(height);
                    let ray = context.camera.ray(s, t, &mut rng);
                    color += trace(&context.scene, &ray, max_depth, &mut rng, &mut total_rays);
                }
                pixels.extend_from_slice(&to_rgba(color * scale));
            }
        }

        Ok(RawFrame {
            pixels,
            width,
            height,
            samples_per_pixel,
            total_rays,
        })
    }
}

fn trace(scene: &Scene, ray: &Ray, depth: u32, rng: &mut ChaCha8Rng, rays: &mut u64) -> DVec3 {
    if depth == 0 {
        return DVec3::ZERO;
    }
    *rays += 1;

    match scene.hit(ray, 0.001, f64::INFINITY) {
        Some(hit) => match hit.material.scatter(ray, &hit, rng) {
            Some((attenuation, scattered)) => {
                attenuation * trace(scene, &scattered, depth - 1, rng, rays)
            }
            None => DVec3::ZERO,
        },
        None => {
            let t = 0.5 * (ray.direction.normalize().y + 1.0);
            (1.0 - t) * DVec3::ONE + t * DVec3::new(0.5, 0.7, 1.0)
        }
    }
}

// gamma 2
fn to_rgba(color: DVec3) -> [u8; 4] {
    let channel = |c: f64| (256.0 * c.max(0.0).sqrt().clamp(0.0, 0.999)) as u8;
    [channel(color.x), channel(color.y), channel(color.z), 255]
}

/// Loads a fresh [`RayTracer`] wherever it is asked to.
#[derive(Debug, Clone, Default)]
pub struct TracerLoader {
    config: TracerConfig,
}

impl TracerLoader {
    pub fn new(config: TracerConfig) -> Self {
        Self { config }
    }
}

impl ComputeLoader for TracerLoader {
    fn load(&self) -> Result<Box<dyn ComputeModule>> {
        Ok(Box::new(RayTracer::new(self.config.clone())))
    }
}
