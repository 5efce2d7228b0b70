use serde::{Deserialize, Serialize};

use crate::core::region::Axis;

/// Element precision of a field or of its ghost buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Quarter,
    Half,
    Single,
    Double,
}

impl Precision {
    pub fn size(self) -> usize {
        match self {
            Precision::Quarter => 1,
            Precision::Half => 2,
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    /// Fixed-point storage carries a per-site norm alongside the data.
    pub fn is_fixed(self) -> bool {
        matches!(self, Precision::Quarter | Precision::Half)
    }
}

/// Read-only shape and precision metadata of a lattice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGeometry {
    /// Local extent per axis.
    pub dims: [usize; 4],
    pub n_color: usize,
    pub n_spin: usize,
    /// Boundary face depth.
    pub n_face: usize,
    /// Fifth-dimension extent (1 for four-dimensional fields).
    pub ls: usize,
    pub precision: Precision,
    pub ghost_precision: Precision,
    /// Gauge-link reconstruction element count.
    pub reconstruct: usize,
}

impl FieldGeometry {
    pub fn new(dims: [usize; 4], n_color: usize, n_spin: usize) -> Self {
        Self {
            dims,
            n_color,
            n_spin,
            n_face: 1,
            ls: 1,
            precision: Precision::Single,
            ghost_precision: Precision::Single,
            reconstruct: 18,
        }
    }

    pub fn volume(&self) -> usize {
        self.dims.iter().product()
    }

    /// Sites in one boundary slab of the given axis.
    pub fn ghost_face(&self, axis: Axis) -> usize {
        self.n_face * self.volume() / self.dims[axis.index()]
    }

    /// Real scalars per site (complex color-spin components).
    pub fn site_len(&self) -> usize {
        2 * self.n_color * self.n_spin
    }

    /// Element offset of one direction's slab within an axis's ghost
    /// region (both directions stored back to back).
    pub fn ghost_offset(&self, axis: Axis, dir: usize) -> usize {
        dir * self.ghost_face(axis) * self.site_len()
    }

    /// Total scalars across all ghost slabs of all axes.
    pub fn ghost_len(&self) -> usize {
        Axis::ALL
            .iter()
            .map(|&a| 2 * self.ghost_face(a) * self.site_len())
            .sum()
    }

    pub fn coords(&self, mut site: usize) -> [usize; 4] {
        let mut c = [0usize; 4];
        for i in 0..4 {
            c[i] = site % self.dims[i];
            site /= self.dims[i];
        }
        c
    }

    pub fn index(&self, c: [usize; 4]) -> usize {
        ((c[3] * self.dims[2] + c[2]) * self.dims[1] + c[1]) * self.dims[0] + c[0]
    }

    /// Neighboring site along an axis with periodic wrap in the local
    /// volume. dir 0 is backwards, dir 1 forwards.
    pub fn neighbor(&self, site: usize, axis: Axis, dir: usize) -> usize {
        let d = axis.index();
        let mut c = self.coords(site);
        c[d] = if dir == 0 {
            (c[d] + self.dims[d] - 1) % self.dims[d]
        } else {
            (c[d] + 1) % self.dims[d]
        };
        self.index(c)
    }

    /// Whether a site sits within the boundary slab of an axis in the
    /// given direction.
    pub fn on_boundary(&self, site: usize, axis: Axis, dir: usize) -> bool {
        let d = axis.index();
        let c = self.coords(site);
        if dir == 0 {
            c[d] < self.n_face
        } else {
            c[d] >= self.dims[d] - self.n_face
        }
    }

    /// Position of a boundary site within its slab's enumeration order.
    pub fn face_index(&self, site: usize, axis: Axis) -> usize {
        let d = axis.index();
        let c = self.coords(site);
        let mut idx = 0;
        let mut stride = 1;
        for i in 0..4 {
            if i == d {
                continue;
            }
            idx += c[i] * stride;
            stride *= self.dims[i];
        }
        idx
    }
}

/// The field collaborator: geometry metadata, the double-buffer rotation
/// index, site and ghost data access, and the save/restore pair used to
/// protect aliased outputs while the tuner runs speculative launches.
pub trait StencilField {
    fn geometry(&self) -> &FieldGeometry;
    fn buffer_index(&self) -> usize;
    fn data(&self) -> &[f32];
    fn data_mut(&mut self) -> &mut [f32];
    fn ghost(&self, axis: Axis) -> &[f32];
    fn ghost_mut(&mut self, axis: Axis) -> &mut [f32];
    fn backup(&mut self);
    fn restore(&mut self);
}

/// Host-resident field: flat f32 site data plus one ghost region per
/// axis, with a backup stack for tuning protection.
#[derive(Debug, Clone)]
pub struct HostField {
    geom: FieldGeometry,
    data: Vec<f32>,
    ghost: [Vec<f32>; 4],
    buffer_index: usize,
    backups: Vec<Vec<f32>>,
}

impl HostField {
    pub fn new(geom: FieldGeometry) -> Self {
        let data = vec![0.0; geom.volume() * geom.site_len()];
        let ghost = [
            vec![0.0; 2 * geom.ghost_face(Axis::X) * geom.site_len()],
            vec![0.0; 2 * geom.ghost_face(Axis::Y) * geom.site_len()],
            vec![0.0; 2 * geom.ghost_face(Axis::Z) * geom.site_len()],
            vec![0.0; 2 * geom.ghost_face(Axis::T) * geom.site_len()],
        ];
        Self {
            geom,
            data,
            ghost,
            buffer_index: 0,
            backups: Vec::new(),
        }
    }

    /// Advance the double-buffer slot; called once per operator
    /// application after the exchange completes.
    pub fn rotate_buffer(&mut self) {
        self.buffer_index = 1 - self.buffer_index;
    }

    pub fn fill(&mut self, f: impl Fn(usize) -> f32) {
        for (i, v) in self.data.iter_mut().enumerate() {
            *v = f(i);
        }
    }

    pub fn fill_ghost(&mut self, axis: Axis, f: impl Fn(usize) -> f32) {
        for (i, v) in self.ghost[axis.index()].iter_mut().enumerate() {
            *v = f(i);
        }
    }
}

impl StencilField for HostField {
    fn geometry(&self) -> &FieldGeometry {
        &self.geom
    }

    fn buffer_index(&self) -> usize {
        self.buffer_index
    }

    fn data(&self) -> &[f32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn ghost(&self, axis: Axis) -> &[f32] {
        &self.ghost[axis.index()]
    }

    fn ghost_mut(&mut self, axis: Axis) -> &mut [f32] {
        &mut self.ghost[axis.index()]
    }

    fn backup(&mut self) {
        self.backups.push(self.data.clone());
    }

    fn restore(&mut self) {
        let saved = self
            .backups
            .pop()
            .expect("restore without a matching backup");
        self.data = saved;
    }
}
