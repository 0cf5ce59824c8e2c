use super::Vector3i;

/// 3D Bresenham line from `start` to `end`, both endpoints included.
///
/// Consecutive points differ by at most one on every axis.
pub fn bresenham(start: Vector3i, end: Vector3i) -> Vec<Vector3i> {
    let dx = (end.x - start.x).abs();
    let dy = (end.y - start.y).abs();
    let dz = (end.z - start.z).abs();
    let sx = (end.x - start.x).signum();
    let sy = (end.y - start.y).signum();
    let sz = (end.z - start.z).signum();

    let mut points = Vec::with_capacity((dx.max(dy).max(dz) + 1) as usize);
    let mut p = start;
    points.push(p);

    if dx >= dy && dx >= dz {
        let mut e1 = 2 * dy - dx;
        let mut e2 = 2 * dz - dx;
        while p.x != end.x {
            if e1 >= 0 {
                p.y += sy;
                e1 -= 2 * dx;
            }
            if e2 >= 0 {
                p.z += sz;
                e2 -= 2 * dx;
            }
            e1 += 2 * dy;
            e2 += 2 * dz;
            p.x += sx;
            points.push(p);
        }
    } else if dy >= dx && dy >= dz {
        let mut e1 = 2 * dx - dy;
        let mut e2 = 2 * dz - dy;
        while p.y != end.y {
            if e1 >= 0 {
                p.x += sx;
                e1 -= 2 * dy;
            }
            if e2 >= 0 {
                p.z += sz;
                e2 -= 2 * dy;
            }
            e1 += 2 * dx;
            e2 += 2 * dz;
            p.y += sy;
            points.push(p);
        }
    } else {
        let mut e1 = 2 * dy - dz;
        let mut e2 = 2 * dx - dz;
        while p.z != end.z {
            if e1 >= 0 {
                p.y += sy;
                e1 -= 2 * dz;
            }
            if e2 >= 0 {
                p.x += sx;
                e2 -= 2 * dz;
            }
            e1 += 2 * dy;
            e2 += 2 * dx;
            p.z += sz;
            points.push(p);
        }
    }

    points
}
