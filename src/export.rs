//! PNG export of a generated world.
//!
//! Renders a coarse overview map: rivers, the street network, village hulls,
//! stations and the spanning-tree connections between them.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::geom::{Line, Vec2};
use crate::pipeline::GeneratedWorld;
use crate::streets::StreetKind;

const BACKGROUND_COLOR: Rgb<u8> = Rgb([0xdb, 0xcf, 0xb1]);
const WATER_COLOR: Rgb<u8> = Rgb([0x6d, 0x83, 0x8e]);
const HIGHWAY_COLOR: Rgb<u8> = Rgb([0x97, 0x8c, 0x63]);
const LOCAL_COLOR: Rgb<u8> = Rgb([0xb9, 0xab, 0x73]);
const VILLAGE_COLOR: Rgb<u8> = Rgb([0xc4, 0xb8, 0x9d]);
const CONNECTION_COLOR: Rgb<u8> = Rgb([0x93, 0x7b, 0x6a]);
const STATION_FILL_COLOR: Rgb<u8> = Rgb([0x83, 0x9c, 0xa9]);
const STATION_STROKE_COLOR: Rgb<u8> = Rgb([0x6d, 0x83, 0x8e]);

/// Render `world` to a square image and save it as PNG.
pub fn export_world_map(
    world: &GeneratedWorld,
    path: &str,
    image_size: u32,
) -> Result<(), image::ImageError> {
    render_world(world, image_size).save(path)
}

/// Render the world overview into an image buffer.
pub fn render_world(world: &GeneratedWorld, image_size: u32) -> RgbImage {
    let mut img: RgbImage = ImageBuffer::from_pixel(image_size, image_size, BACKGROUND_COLOR);

    let scale = image_size as f64 / world.params.world.width();
    let origin = world.params.world.min;

    // rivers first, everything else draws over them
    for river in &world.terrain.rivers {
        let radius = river.width / 2.0 * scale;
        for line in &river.lines {
            // stamp discs along the centerline to fill the stroke
            let length = line.length();
            let steps = (length * scale).ceil().max(1.0) as usize;
            for step in 0..=steps {
                let t = step as f64 / steps as f64;
                let point = line.start + line.direction() * (length * t);
                fill_disc(&mut img, to_pixel(point, origin, scale), radius, WATER_COLOR);
            }
        }
    }

    for village in &world.villages {
        let hull = &village.hull;
        for i in 0..hull.len() {
            let edge = Line::new(hull[i], hull[(i + 1) % hull.len()]);
            draw_line(&mut img, &edge, origin, scale, VILLAGE_COLOR);
        }
    }

    // highways over locals
    for pass in [StreetKind::Local, StreetKind::Highway] {
        for segment in world.streets.items() {
            if segment.kind == pass {
                let color = match segment.kind {
                    StreetKind::Highway => HIGHWAY_COLOR,
                    StreetKind::Local => LOCAL_COLOR,
                };
                draw_line(&mut img, &segment.line, origin, scale, color);
            }
        }
    }

    for edge in world.mst.edges() {
        let line = Line::new(
            world.stations[edge.one.index()].position,
            world.stations[edge.two.index()].position,
        );
        draw_line(&mut img, &line, origin, scale, CONNECTION_COLOR);
    }

    for station in &world.stations {
        let center = to_pixel(station.position, origin, scale);
        fill_disc(&mut img, center, 4.0, STATION_STROKE_COLOR);
        fill_disc(&mut img, center, 3.0, STATION_FILL_COLOR);
    }

    img
}

fn to_pixel(point: Vec2, origin: Vec2, scale: f64) -> (f64, f64) {
    ((point.x - origin.x) * scale, (point.y - origin.y) * scale)
}

/// Plot a world-space line by stepping along it in half-pixel increments.
fn draw_line(img: &mut RgbImage, line: &Line, origin: Vec2, scale: f64, color: Rgb<u8>) {
    let start = to_pixel(line.start, origin, scale);
    let end = to_pixel(line.end, origin, scale);

    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let steps = (dx.abs().max(dy.abs()) * 2.0).ceil().max(1.0) as usize;

    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        put_pixel(img, start.0 + dx * t, start.1 + dy * t, color);
    }
}

fn fill_disc(img: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
    let r = radius.max(0.5);
    let (cx, cy) = center;

    let x0 = (cx - r).floor() as i64;
    let x1 = (cx + r).ceil() as i64;
    let y0 = (cy - r).floor() as i64;
    let y1 = (cy + r).ceil() as i64;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r * r {
                put_pixel(img, x as f64, y as f64, color);
            }
        }
    }
}

fn put_pixel(img: &mut RgbImage, x: f64, y: f64, color: Rgb<u8>) {
    if x < 0.0 || y < 0.0 {
        return;
    }

    let (x, y) = (x as u32, y as u32);
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StationGraph;
    use crate::grid::SpatialGrid;
    use crate::pipeline::WorldParams;
    use crate::terrain::Terrain;

    fn empty_world() -> GeneratedWorld {
        GeneratedWorld {
            params: WorldParams::default(),
            terrain: Terrain::default(),
            streets: SpatialGrid::with_items([]),
            villages: Vec::new(),
            stations: Vec::new(),
            mst: StationGraph::default(),
            budget: crate::graph::Coins(0),
            rng_check: 0,
        }
    }

    #[test]
    fn test_empty_world_renders_background_only() {
        let img = render_world(&empty_world(), 64);

        assert_eq!(img.dimensions(), (64, 64));
        assert!(img.pixels().all(|&pixel| pixel == BACKGROUND_COLOR));
    }

    #[test]
    fn test_stations_are_stamped() {
        let mut world = empty_world();
        world.stations.push(crate::stations::Station {
            position: Vec2::splat(16_000.0),
            village: 0,
        });

        let img = render_world(&world, 64);
        assert_eq!(*img.get_pixel(32, 32), STATION_FILL_COLOR);
    }
}
