//! Scene description for the built-in tracer: rays, spheres, materials, camera.

use glam::DVec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    Lambertian { albedo: DVec3 },
    Metal { albedo: DVec3, fuzz: f64 },
    Dielectric { ir: f64 },
}

pub struct Hit {
    pub point: DVec3,
    pub normal: DVec3,
    pub t: f64,
    pub front_face: bool,
    pub material: Material,
}

#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: DVec3,
    pub radius: f64,
    pub material: Material,
}

impl Sphere {
    fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        let oc = ray.origin - self.center;
        let a = ray.direction.length_squared();
        let half_b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();
        let mut root = (-half_b - sqrtd) / a;
        if root < t_min || root > t_max {
            root = (-half_b + sqrtd) / a;
            if root < t_min || root > t_max {
                return None;
            }
        }

        let point = ray.at(root);
        let outward = (point - self.center) / self.radius;
        let front_face = ray.direction.dot(outward) < 0.0;
        Some(Hit {
            point,
            normal: if front_face { outward } else { -outward },
            t: root,
            front_face,
            material: self.material,
        })
    }
}

pub struct Scene {
    spheres: Vec<Sphere>,
}

impl Scene {
    pub fn new(spheres: Vec<Sphere>) -> Self {
        Self { spheres }
    }

    /// Mirror, matte blue and glass spheres on a dark ground.
    pub fn three_spheres() -> Self {
        let rgb = |r: f64, g: f64, b: f64| DVec3::new(r, g, b) / 255.0;
        Self::new(vec![
            Sphere {
                center: DVec3::new(1.10, 0.6, -4.0),
                radius: 1.0,
                material: Material::Metal {
                    albedo: rgb(224.0, 232.0, 245.0),
                    fuzz: 0.0,
                },
            },
            Sphere {
                center: DVec3::new(-1.3, 0.6, -2.9),
                radius: 1.0,
                material: Material::Lambertian {
                    albedo: rgb(122.0, 175.0, 238.0),
                },
            },
            Sphere {
                center: DVec3::new(0.01, 0.83, -0.1),
                radius: 0.22,
                material: Material::Dielectric { ir: 1.5 },
            },
            Sphere {
                center: DVec3::new(0.0, -1000.45, -1.2),
                radius: 1000.0,
                material: Material::Lambertian {
                    albedo: rgb(28.0, 28.0, 28.0),
                },
            },
        ])
    }

    /// Five spheres in an arc behind a large glass sphere.
    pub fn glass_spheres() -> Self {
        let rgb = |r: f64, g: f64, b: f64| DVec3::new(r, g, b) / 255.0;
        let arc = [
            (
                -3.363,
                -3.205,
                Material::Lambertian {
                    albedo: DVec3::ONE,
                },
            ),
            (
                -1.84,
                -4.528,
                Material::Metal {
                    albedo: rgb(64.0, 64.0, 64.0),
                    fuzz: 0.1,
                },
            ),
            (
                0.0,
                -4.8,
                Material::Lambertian {
                    albedo: rgb(122.0, 175.0, 238.0),
                },
            ),
            (
                1.84,
                -4.528,
                Material::Metal {
                    albedo: rgb(253.0, 253.0, 255.0),
                    fuzz: 0.0,
                },
            ),
            (
                3.363,
                -3.205,
                Material::Metal {
                    albedo: rgb(208.0, 66.0, 70.0),
                    fuzz: 0.3,
                },
            ),
        ];

        let mut spheres: Vec<Sphere> = arc
            .into_iter()
            .map(|(x, z, material)| Sphere {
                center: DVec3::new(x, 0.45, z),
                radius: 0.9,
                material,
            })
            .collect();
        spheres.push(Sphere {
            center: DVec3::new(0.0, 0.45, -1.0),
            radius: 0.9,
            material: Material::Dielectric { ir: 1.5 },
        });
        spheres.push(Sphere {
            center: DVec3::new(0.0, -1000.45, -1.2),
            radius: 1000.0,
            material: Material::Lambertian {
                albedo: rgb(72.0, 72.0, 72.0),
            },
        });
        Self::new(spheres)
    }

    /// Glass, matte and metal feature spheres on a green ground, surrounded by a grid of small
    /// spheres with random materials.
    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        let rgb = |r: f64, g: f64, b: f64| DVec3::new(r, g, b) / 255.0;
        let mut spheres = vec![
            Sphere {
                center: DVec3::new(0.0, -1000.0, 0.0),
                radius: 1000.0,
                material: Material::Lambertian {
                    albedo: rgb(80.0, 144.0, 22.0),
                },
            },
            Sphere {
                center: DVec3::new(0.0, 1.0, 0.0),
                radius: 1.0,
                material: Material::Dielectric { ir: 1.5 },
            },
            Sphere {
                center: DVec3::new(-4.0, 1.0, 0.0),
                radius: 1.0,
                material: Material::Lambertian {
                    albedo: rgb(111.0, 165.0, 242.0),
                },
            },
            Sphere {
                center: DVec3::new(4.0, 1.0, 0.0),
                radius: 1.0,
                material: Material::Metal {
                    albedo: DVec3::new(0.7, 0.6, 0.5),
                    fuzz: 0.0,
                },
            },
        ];

        let keep_clear = DVec3::new(4.0, 0.2, 0.0);
        for a in -11..11 {
            for b in -11..11 {
                let choice = rng.gen::<f64>();
                let center = DVec3::new(
                    f64::from(a) + 0.9 * rng.gen::<f64>(),
                    0.2,
                    f64::from(b) + 0.9 * rng.gen::<f64>(),
                );
                if (center - keep_clear).length() <= 0.9 {
                    continue;
                }

                let material = if choice < 0.66 {
                    Material::Lambertian {
                        albedo: random_color(rng, 0.0, 1.0) * random_color(rng, 0.0, 1.0),
                    }
                } else if choice < 0.85 {
                    Material::Metal {
                        albedo: random_color(rng, 0.5, 1.0),
                        fuzz: rng.gen_range(0.0..0.5),
                    }
                } else {
                    Material::Dielectric { ir: 1.5 }
                };
                spheres.push(Sphere {
                    center,
                    radius: 0.2,
                    material,
                });
            }
        }
        Self::new(spheres)
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        let mut closest = t_max;
        let mut found = None;
        for sphere in &self.spheres {
            if let Some(hit) = sphere.hit(ray, t_min, closest) {
                closest = hit.t;
                found = Some(hit);
            }
        }
        found
    }
}

impl Material {
    /// Attenuation and scattered ray, or `None` if the ray is absorbed.
    pub fn scatter(&self, ray: &Ray, hit: &Hit, rng: &mut ChaCha8Rng) -> Option<(DVec3, Ray)> {
        match *self {
            Material::Lambertian { albedo } => {
                let mut direction = hit.normal + random_unit_vector(rng);
                if direction.abs().max_element() < 1e-8 {
                    direction = hit.normal;
                }
                Some((
                    albedo,
                    Ray {
                        origin: hit.point,
                        direction,
                    },
                ))
            }
            Material::Metal { albedo, fuzz } => {
                let reflected = reflect(ray.direction.normalize(), hit.normal);
                let direction = reflected + fuzz * random_in_unit_sphere(rng);
                (direction.dot(hit.normal) > 0.0).then_some((
                    albedo,
                    Ray {
                        origin: hit.point,
                        direction,
                    },
                ))
            }
            Material::Dielectric { ir } => {
                let ratio = if hit.front_face { 1.0 / ir } else { ir };
                let unit = ray.direction.normalize();
                let cos_theta = (-unit).dot(hit.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

                let direction = if ratio * sin_theta > 1.0
                    || reflectance(cos_theta, ratio) > rng.gen::<f64>()
                {
                    reflect(unit, hit.normal)
                } else {
                    refract(unit, hit.normal, ratio)
                };
                Some((
                    DVec3::ONE,
                    Ray {
                        origin: hit.point,
                        direction,
                    },
                ))
            }
        }
    }
}

/// Thin-lens camera. With a zero aperture every ray starts at the eye point.
pub struct Camera {
    origin: DVec3,
    lower_left_corner: DVec3,
    horizontal: DVec3,
    vertical: DVec3,
    u: DVec3,
    v: DVec3,
    lens_radius: f64,
}

/// Placement and optics for [`Camera::new`].
#[derive(Debug, Clone, Copy)]
pub struct CameraSetup {
    pub lookfrom: DVec3,
    pub lookat: DVec3,
    pub vup: DVec3,
    pub vfov_degrees: f64,
    pub aperture: f64,
    pub focus_distance: f64,
}

impl Camera {
    pub fn new(setup: CameraSetup, aspect: f64) -> Self {
        let h = (setup.vfov_degrees.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = aspect * viewport_height;

        let w = (setup.lookfrom - setup.lookat).normalize();
        let u = setup.vup.cross(w).normalize();
        let v = w.cross(u);

        let horizontal = u * viewport_width * setup.focus_distance;
        let vertical = v * viewport_height * setup.focus_distance;
        Self {
            origin: setup.lookfrom,
            lower_left_corner: setup.lookfrom
                - horizontal / 2.0
                - vertical / 2.0
                - w * setup.focus_distance,
            horizontal,
            vertical,
            u,
            v,
            lens_radius: setup.aperture / 2.0,
        }
    }

    /// Ray through viewport coordinates in `[0, 1]`, `t = 0` at the bottom.
    pub fn ray(&self, s: f64, t: f64, rng: &mut ChaCha8Rng) -> Ray {
        let offset = if self.lens_radius > 0.0 {
            let rd = random_in_unit_disk(rng) * self.lens_radius;
            self.u * rd.x + self.v * rd.y
        } else {
            DVec3::ZERO
        };
        Ray {
            origin: self.origin + offset,
            direction: self.lower_left_corner + s * self.horizontal + t * self.vertical
                - self.origin
                - offset,
        }
    }
}

fn reflect(v: DVec3, n: DVec3) -> DVec3 {
    v - 2.0 * v.dot(n) * n
}

fn refract(uv: DVec3, n: DVec3, ratio: f64) -> DVec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let perp = ratio * (uv + cos_theta * n);
    let parallel = -(1.0 - perp.length_squared()).abs().sqrt() * n;
    perp + parallel
}

// Schlick
fn reflectance(cosine: f64, ratio: f64) -> f64 {
    let r0 = ((1.0 - ratio) / (1.0 + ratio)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

fn random_in_unit_sphere(rng: &mut ChaCha8Rng) -> DVec3 {
    loop {
        let p = DVec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

fn random_in_unit_disk(rng: &mut ChaCha8Rng) -> DVec3 {
    loop {
        let p = DVec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

fn random_color(rng: &mut ChaCha8Rng, min: f64, max: f64) -> DVec3 {
    DVec3::new(
        rng.gen_range(min..max),
        rng.gen_range(min..max),
        rng.gen_range(min..max),
    )
}

fn random_unit_vector(rng: &mut ChaCha8Rng) -> DVec3 {
    random_in_unit_sphere(rng).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn ray_at_moves_along_direction() {
        let ray = Ray {
            origin: DVec3::new(3.0, 5.0, 2.0),
            direction: DVec3::new(8.0, -2.0, 1.0),
        };
        assert_eq!(ray.at(10.0), DVec3::new(83.0, -15.0, 12.0));
    }

    #[test]
    fn sphere_hit_reports_nearest_front_face() {
        let scene = Scene::new(vec![Sphere {
            center: DVec3::new(0.0, 0.0, -5.0),
            radius: 1.0,
            material: Material::Lambertian {
                albedo: DVec3::splat(0.5),
            },
        }]);
        let ray = Ray {
            origin: DVec3::ZERO,
            direction: DVec3::new(0.0, 0.0, -1.0),
        };

        let hit = scene.hit(&ray, 0.001, f64::INFINITY).expect("ray should hit");
        assert!((hit.t - 4.0).abs() < 1e-9);
        assert!(hit.front_face);
        assert_eq!(hit.normal, DVec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn ray_pointing_away_misses() {
        let scene = Scene::three_spheres();
        let ray = Ray {
            origin: DVec3::new(0.0, 0.5, 4.0),
            direction: DVec3::new(0.0, 1.0, 0.0),
        };
        assert!(scene.hit(&ray, 0.001, f64::INFINITY).is_none());
    }

    #[test]
    fn built_in_scenes_have_ground_and_spheres() {
        assert_eq!(Scene::three_spheres().len(), 4);
        assert_eq!(Scene::glass_spheres().len(), 7);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let random = Scene::random(&mut rng);
        assert!(random.len() > 4);
        assert!(random.len() <= 4 + 22 * 22);
    }

    #[test]
    fn random_scene_is_reproducible() {
        let ray = Ray {
            origin: DVec3::new(13.0, 2.0, 3.0),
            direction: DVec3::new(-13.0, -2.0, -3.0),
        };
        let first = Scene::random(&mut ChaCha8Rng::seed_from_u64(9));
        let second = Scene::random(&mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(first.len(), second.len());

        let t1 = first.hit(&ray, 0.001, f64::INFINITY).map(|h| h.t);
        let t2 = second.hit(&ray, 0.001, f64::INFINITY).map(|h| h.t);
        assert_eq!(t1, t2);
    }

    #[test]
    fn lens_offsets_ray_origin_but_keeps_focus_point() {
        let setup = CameraSetup {
            lookfrom: DVec3::new(0.0, 0.0, 0.0),
            lookat: DVec3::new(0.0, 0.0, -1.0),
            vup: DVec3::Y,
            vfov_degrees: 90.0,
            aperture: 0.0,
            focus_distance: 5.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pinhole = Camera::new(setup, 1.0).ray(0.5, 0.5, &mut rng);
        assert_eq!(pinhole.origin, DVec3::ZERO);

        let lens = Camera::new(
            CameraSetup {
                aperture: 2.0,
                ..setup
            },
            1.0,
        );
        let ray = lens.ray(0.5, 0.5, &mut rng);
        assert!(ray.origin.z.abs() < 1e-12);
        // every lens ray through the viewport centre meets the focus plane at the same point
        let focus = ray.at(1.0);
        assert!((focus - DVec3::new(0.0, 0.0, -5.0)).length() < 1e-9);
    }

    #[test]
    fn reflect_flips_normal_component() {
        let out = reflect(DVec3::new(1.0, -1.0, 0.0), DVec3::Y);
        assert_eq!(out, DVec3::new(1.0, 1.0, 0.0));
    }
}
