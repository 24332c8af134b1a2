//! Bounding trees over object lists.
//!
//! A long list is split in two along the axis where its members' centers
//! spread the most, and the halves are split again until no part holds
//! more than `max_cluster` objects. Each part becomes a `BBox` node; when
//! there are still too many nodes the nodes are clustered the same way.

use log::{ debug, warn };

use crate::consts::{ BOUND_THRESHOLD, MAX_CLUSTER_SIZE, UNBOUNDED_LIMIT };
use crate::shape::{ make_bbox, Object };
use crate::stats::Stats;
use crate::vector::Vec3;

/// When and how tightly lists are bounded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounding {
    /// Lists shorter than this are left alone.
    pub threshold: usize,

    /// Most objects placed directly in one box.
    pub max_cluster: usize,
}

impl Default for Bounding {
    fn default() -> Bounding {
        Bounding { threshold: BOUND_THRESHOLD, max_cluster: MAX_CLUSTER_SIZE }
    }
}

impl Bounding {
    pub fn new(threshold: usize, max_cluster: usize) -> Bounding {
        Bounding { threshold, max_cluster }
    }

    /// Returns `objects` with the boundable ones gathered into a tree of
    /// `BBox` nodes.
    ///
    /// Objects reaching past `UNBOUNDED_LIMIT` (planes, inverse shapes)
    /// would make every box around them useless; they stay at the top
    /// level after the tree.
    pub fn build(&self, objects: Vec<Object>, stats: &Stats) -> Vec<Object> {
        if self.max_cluster < 2 {
            return objects;
        }

        let (bounded, unbounded): (Vec<Object>, Vec<Object>) = objects.into_iter()
            .partition(|o| is_boundable(o));

        if !unbounded.is_empty() {
            warn!("{} object(s) too large to bound", unbounded.len());
        }

        if bounded.len() < self.threshold || bounded.len() <= self.max_cluster {
            let mut out = bounded;
            out.extend(unbounded);
            return out;
        }

        let count = bounded.len();
        let mut level = bounded;
        loop {
            level = self.partition(level)
                .into_iter()
                .map(|mut part| {
                    if part.len() == 1 {
                        part.remove(0)
                    } else {
                        stats.num_bounds.set(stats.num_bounds.get() + 1);
                        make_bbox(part)
                    }
                })
                .collect();

            if level.len() <= self.max_cluster {
                break;
            }
        }

        debug!("bounded {} objects, {} boxes so far", count, stats.num_bounds.get());
        level.extend(unbounded);
        level
    }

    /// Splits `objects` until no part is longer than `max_cluster`.
    fn partition(&self, objects: Vec<Object>) -> Vec<Vec<Object>> {
        let mut done = Vec::new();
        let mut todo = vec![objects];

        while let Some(list) = todo.pop() {
            if list.len() <= self.max_cluster {
                done.push(list);
            } else {
                let (lo, hi) = divide(list);
                todo.push(hi);
                todo.push(lo);
            }
        }

        done
    }
}

fn is_boundable(obj: &Object) -> bool {
    let (bmin, bmax) = obj.extents();
    (0..3).all(|a| bmin[a] > -UNBOUNDED_LIMIT && bmax[a] < UNBOUNDED_LIMIT)
}

fn centroid(obj: &Object) -> Vec3 {
    let (bmin, bmax) = obj.extents();
    (bmin + bmax) * 0.5
}

/// Splits a list in two non-empty halves.
///
/// First tries the mean of the centers on the axis where they spread the
/// most, then the widest gap between centers, then plain halving.
fn divide(objects: Vec<Object>) -> (Vec<Object>, Vec<Object>) {
    let centers: Vec<Vec3> = objects.iter().map(centroid).collect();

    let mut lo = Vec3::splat(f64::INFINITY);
    let mut hi = Vec3::splat(f64::NEG_INFINITY);
    let mut mean = Vec3::zero();
    for c in centers.iter() {
        lo = lo.min(c);
        hi = hi.max(c);
        mean = mean + *c;
    }
    mean = mean / centers.len() as f64;

    let spread = hi - lo;
    let axis = if spread.x >= spread.y && spread.x >= spread.z {
        0
    } else if spread.y >= spread.z {
        1
    } else {
        2
    };

    let split = mean[axis];
    let above: Vec<bool> = centers.iter().map(|c| c[axis] > split).collect();
    let objects = match split_by(objects, &above) {
        Ok(parts) => return parts,
        Err(objects) => objects,
    };

    // Every center sits on one side; unreachable with distinct centers
    // but likely with nested or coincident objects.
    let objects = match largest_gap(&centers) {
        Some((axis, split)) => {
            let above: Vec<bool> = centers.iter().map(|c| c[axis] > split).collect();
            match split_by(objects, &above) {
                Ok(parts) => return parts,
                Err(objects) => objects,
            }
        },
        None => objects,
    };

    let mut lo = objects;
    let hi = lo.split_off(lo.len() / 2);
    (lo, hi)
}

/// The axis and position of the widest empty stretch between centers.
fn largest_gap(centers: &[Vec3]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;

    for axis in 0..3 {
        let mut along: Vec<f64> = centers.iter().map(|c| c[axis]).collect();
        along.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for pair in along.windows(2) {
            let gap = pair[1] - pair[0];
            if gap > 0.0 && best.map_or(true, |(_, _, g)| gap > g) {
                best = Some((axis, (pair[0] + pair[1]) * 0.5, gap));
            }
        }
    }

    best.map(|(axis, split, _)| (axis, split))
}

/// Separates `objects` by the `above` mask, or hands the list back when one
/// side would be empty.
fn split_by(objects: Vec<Object>, above: &[bool]) -> Result<(Vec<Object>, Vec<Object>), Vec<Object>> {
    let n = above.iter().filter(|a| **a).count();
    if n == 0 || n == above.len() {
        return Err(objects);
    }

    let mut lo = Vec::with_capacity(above.len() - n);
    let mut hi = Vec::with_capacity(n);
    for (obj, up) in objects.into_iter().zip(above.iter()) {
        if *up {
            hi.push(obj);
        } else {
            lo.push(obj);
        }
    }
    Ok((lo, hi))
}

/* Tests */

#[cfg(test)]
use crate::intersect::{ find_all, find_closest, Scan };
#[cfg(test)]
use crate::ray::Ray;
#[cfg(test)]
use crate::shape::{ make_sphere, ObjectKind };

#[cfg(test)]
fn row(n: usize) -> Vec<Object> {
    (0..n).map(|i| make_sphere(Vec3::new(3.0 * i as f64, 0.0, 0.0), 1.0)).collect()
}

#[cfg(test)]
fn leaves(objects: &[Object]) -> usize {
    objects.iter()
        .map(|o| match &o.kind {
            ObjectKind::BBox(bb) => leaves(&bb.children),
            _ => 1,
        })
        .sum()
}

#[test]
fn short_lists_stay_flat() {
    let stats = Stats::new();
    let out = Bounding::default().build(row(5), &stats);

    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|o| !o.is_bbox()));
    assert_eq!(stats.num_bounds.get(), 0);
}

#[test]
fn long_list_becomes_a_tree() {
    let stats = Stats::new();
    let out = Bounding::new(4, 4).build(row(40), &stats);

    assert!(out.len() <= 4);
    assert_eq!(leaves(&out), 40);
    assert!(stats.num_bounds.get() > 0);

    for node in out.iter() {
        if let ObjectKind::BBox(bb) = &node.kind {
            assert!(bb.children.len() <= 4);
        }
    }
}

#[test]
fn tree_keeps_every_object_reachable() {
    let stats = Stats::new();
    let out = Bounding::new(2, 3).build(row(20), &stats);
    let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let mut pool = Vec::new();

    let n = find_all(&out, &ray, &Scan::new(&stats), &mut pool);
    assert_eq!(n, 40);

    pool.clear();
    let hit = find_closest(&out, &ray, &Scan::new(&stats), &mut pool).unwrap();
    assert!((hit.t - 4.0).abs() < 1e-9);
}

#[test]
fn huge_objects_stay_outside() {
    let stats = Stats::new();
    let mut objects = row(12);
    objects.push(make_sphere(Vec3::zero(), 2.0e6));

    let out = Bounding::new(4, 4).build(objects, &stats);
    let last = out.last().unwrap();
    assert!(!last.is_bbox());
    assert_eq!(leaves(&out), 13);
}

#[test]
fn coincident_objects_are_halved() {
    let stats = Stats::new();
    let objects: Vec<Object> = (0..10).map(|_| make_sphere(Vec3::zero(), 1.0)).collect();

    let out = Bounding::new(2, 4).build(objects, &stats);
    assert!(out.len() <= 4);
    assert_eq!(leaves(&out), 10);
}

#[test]
fn gap_split_after_a_failed_mean() {
    let centers = vec![Vec3::zero(), Vec3::zero(), Vec3::new(0.0, 0.0, 6.0)];
    assert_eq!(largest_gap(&centers), Some((2, 3.0)));
    assert_eq!(largest_gap(&[Vec3::zero(), Vec3::zero()]), None);
}
