//! Bounding-volume hierarchy over mesh triangles.
//!
//! Built once with median splits on the widest centroid axis, then only
//! read. Nodes live in a flat vector; triangles are stored in leaf order.

use super::triangle::Triangle;
use crate::camera::Ray;
use glam::DVec3;
use ordered_float::OrderedFloat;

const MAX_LEAF_TRIANGLES: usize = 4;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An empty box that any point will grow.
    pub fn empty() -> Self {
        Self {
            min: DVec3::INFINITY,
            max: DVec3::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn grow(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.grow(p);
        }
        aabb
    }

    pub fn extent(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.extent().length()
    }

    /// Slab test. Returns the entry distance (clamped to 0) when the ray
    /// overlaps the box before `t_max`.
    fn hit(&self, origin: DVec3, inv_dir: DVec3, t_max: f64) -> Option<f64> {
        let t1 = (self.min - origin) * inv_dir;
        let t2 = (self.max - origin) * inv_dir;
        let t_near = t1.min(t2).max_element().max(0.0);
        let t_far = t1.max(t2).min_element().min(t_max);
        (t_near <= t_far).then_some(t_near)
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { start: usize, count: usize },
    Interior { left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    kind: NodeKind,
}

/// Closest triangle hit found by a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BvhHit {
    pub distance: f64,
    /// Index of the triangle in the source mesh.
    pub triangle: usize,
}

#[derive(Debug)]
pub(crate) struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
    /// Source-mesh index of each entry in `triangles`.
    source_index: Vec<usize>,
    depth: usize,
}

impl Bvh {
    /// Build over `triangles`, which must be non-empty.
    pub fn build(triangles: Vec<Triangle>) -> Self {
        let centroids: Vec<DVec3> = triangles.iter().map(Triangle::centroid).collect();
        let mut order: Vec<usize> = (0..triangles.len()).collect();
        let mut nodes = Vec::with_capacity(2 * triangles.len() / MAX_LEAF_TRIANGLES + 1);

        let depth = build_recursive(&mut nodes, &mut order, 0, &triangles, &centroids, 1);

        let ordered: Vec<Triangle> = order.iter().map(|&i| triangles[i]).collect();
        Self {
            nodes,
            triangles: ordered,
            source_index: order,
            depth,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    /// Nearest hit along `ray` closer than `t_max`.
    pub fn closest_hit(&self, ray: &Ray, t_max: f64) -> Option<BvhHit> {
        let inv_dir = ray.direction.recip();
        let mut closest = t_max;
        let mut best: Option<BvhHit> = None;

        let mut stack: Vec<usize> = Vec::with_capacity(2 * self.depth + 1);
        if self.nodes[0].bounds.hit(ray.origin, inv_dir, closest).is_some() {
            stack.push(0);
        }

        while let Some(index) = stack.pop() {
            match self.nodes[index].kind {
                NodeKind::Leaf { start, count } => {
                    for slot in start..start + count {
                        if let Some(t) = self.triangles[slot].intersect(ray, closest) {
                            closest = t;
                            best = Some(BvhHit {
                                distance: t,
                                triangle: self.source_index[slot],
                            });
                        }
                    }
                }
                NodeKind::Interior { left, right } => {
                    let hit_left = self.nodes[left].bounds.hit(ray.origin, inv_dir, closest);
                    let hit_right = self.nodes[right].bounds.hit(ray.origin, inv_dir, closest);
                    // Push the farther child first so the nearer one is visited next.
                    match (hit_left, hit_right) {
                        (Some(l), Some(r)) if l <= r => stack.extend([right, left]),
                        (Some(_), Some(_)) => stack.extend([left, right]),
                        (Some(_), None) => stack.push(left),
                        (None, Some(_)) => stack.push(right),
                        (None, None) => {}
                    }
                }
            }
        }

        best
    }
}

/// Build the subtree for `order[..]` (which starts at `offset` in the
/// full ordering) and return its depth. The subtree root is pushed first.
fn build_recursive(
    nodes: &mut Vec<BvhNode>,
    order: &mut [usize],
    offset: usize,
    triangles: &[Triangle],
    centroids: &[DVec3],
    depth: usize,
) -> usize {
    let bounds = order.iter().fold(Aabb::empty(), |acc, &i| {
        let t = &triangles[i];
        acc.union(&Aabb::from_points([t.v0, t.v1, t.v2]))
    });

    let node_index = nodes.len();
    if order.len() <= MAX_LEAF_TRIANGLES {
        nodes.push(BvhNode {
            bounds,
            kind: NodeKind::Leaf {
                start: offset,
                count: order.len(),
            },
        });
        return depth;
    }

    // Split on the axis where centroids spread the most.
    let spread = Aabb::from_points(order.iter().map(|&i| centroids[i])).extent();
    let axis = if spread.x >= spread.y && spread.x >= spread.z {
        0
    } else if spread.y >= spread.z {
        1
    } else {
        2
    };

    let mid = order.len() / 2;
    order.select_nth_unstable_by_key(mid, |&i| OrderedFloat(centroids[i][axis]));

    // Placeholder until both children exist.
    nodes.push(BvhNode {
        bounds,
        kind: NodeKind::Leaf { start: 0, count: 0 },
    });

    let (left_order, right_order) = order.split_at_mut(mid);
    let left = nodes.len();
    let left_depth = build_recursive(nodes, left_order, offset, triangles, centroids, depth + 1);
    let right = nodes.len();
    let right_depth =
        build_recursive(nodes, right_order, offset + mid, triangles, centroids, depth + 1);

    nodes[node_index].kind = NodeKind::Interior { left, right };
    left_depth.max(right_depth)
}
