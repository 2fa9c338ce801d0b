//! Procedural mesh generation for the primitive families volumetric shapes are
//! assembled from.
//!
//! Curved primitives are produced as *template* vertices in a local east/north/up
//! frame: `x` meters east, `y` meters north of the shape's center, and `z` a
//! `[0, 1]` fraction between the shape's lower and upper altitude. Shapes map
//! templates onto the globe (and onto terrain) themselves, so the same template
//! serves any location. Bilinear surfaces are interpolated directly between
//! model-space control points.
//!
//! Every grid is row-major: vertex `(i, j)` of a grid with `cols` columns sits at
//! index `j * (cols + 1) + i` (closed grids wrap and use `j * cols + i`).

use glam::DVec3;
use globus_math::Angle;

use crate::GeometryError;

/// Which side of a surface its triangles face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Front faces point away from the enclosed volume (or up, for caps).
    #[default]
    Outside,
    /// Front faces point into the enclosed volume (or down, for caps).
    Inside,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Outside => Orientation::Inside,
            Orientation::Inside => Orientation::Outside,
        }
    }
}

/// Stateless-per-call mesh generator; the only state is the orientation used
/// for index winding.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeometryBuilder {
    orientation: Orientation,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orientation(orientation: Orientation) -> Self {
        Self { orientation }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    // --- Bilinear surfaces ---

    /// Interpolate a `(u_stacks + 1) x (v_stacks + 1)` grid between four control
    /// points ordered `[p00, p10, p01, p11]` (`u` first, then `v`).
    ///
    /// With [`Orientation::Outside`] the triangles face along `du x dv`.
    pub fn bilinear_surface(
        &self,
        control: &[DVec3; 4],
        u_stacks: u32,
        v_stacks: u32,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_dimension("u_stacks", u_stacks)?;
        check_dimension("v_stacks", v_stacks)?;
        let [p00, p10, p01, p11] = *control;
        let mut out = Vec::with_capacity(((u_stacks + 1) * (v_stacks + 1)) as usize);
        for j in 0..=v_stacks {
            let v = f64::from(j) / f64::from(v_stacks);
            let left = p00.lerp(p01, v);
            let right = p10.lerp(p11, v);
            for i in 0..=u_stacks {
                let u = f64::from(i) / f64::from(u_stacks);
                out.push(left.lerp(right, u));
            }
        }
        Ok(out)
    }

    /// Triangle indices for a bilinear surface grid.
    pub fn bilinear_surface_indices(&self, u_stacks: u32, v_stacks: u32) -> Vec<u32> {
        grid_triangles(u_stacks, v_stacks, false, self.orientation == Orientation::Inside)
    }

    /// Line-segment indices tracing the perimeter of an open grid.
    pub fn grid_outline_indices(&self, cols: u32, rows: u32) -> Vec<u32> {
        let stride = cols + 1;
        let at = |i: u32, j: u32| j * stride + i;
        let mut out = Vec::with_capacity((4 * (cols + rows) * 2) as usize);
        for i in 0..cols {
            out.extend([at(i, 0), at(i + 1, 0)]);
            out.extend([at(i, rows), at(i + 1, rows)]);
        }
        for j in 0..rows {
            out.extend([at(0, j), at(0, j + 1)]);
            out.extend([at(cols, j), at(cols, j + 1)]);
        }
        out
    }

    // --- Cylinders, disks, and walls ---

    /// Wall of a cylinder sweeping clockwise (seen from above) from `start`
    /// through `sweep`. Produces `(slices + 1) x (stacks + 1)` template vertices.
    pub fn partial_cylinder(
        &self,
        radius: f64,
        slices: u32,
        stacks: u32,
        start: Angle,
        sweep: Angle,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_measure("radius", radius)?;
        check_dimension("slices", slices)?;
        check_dimension("stacks", stacks)?;
        let mut out = Vec::with_capacity(((slices + 1) * (stacks + 1)) as usize);
        for j in 0..=stacks {
            let z = f64::from(j) / f64::from(stacks);
            for i in 0..=slices {
                let az = start.radians() + sweep.radians() * f64::from(i) / f64::from(slices);
                out.push(DVec3::new(radius * az.sin(), radius * az.cos(), z));
            }
        }
        Ok(out)
    }

    /// Triangle indices for [`partial_cylinder`](Self::partial_cylinder).
    /// Outside faces away from the axis.
    pub fn partial_cylinder_indices(&self, slices: u32, stacks: u32) -> Vec<u32> {
        // Clockwise u and upward v give du x dv pointing at the axis.
        grid_triangles(slices, stacks, false, self.orientation == Orientation::Outside)
    }

    /// Annular sector between `inner` and `outer` radius at `z = 0`, sweeping
    /// clockwise from `start`. Produces `(slices + 1) x (loops + 1)` vertices.
    pub fn partial_disk(
        &self,
        inner: f64,
        outer: f64,
        slices: u32,
        loops: u32,
        start: Angle,
        sweep: Angle,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_radii(inner, outer)?;
        check_dimension("slices", slices)?;
        check_dimension("loops", loops)?;
        let mut out = Vec::with_capacity(((slices + 1) * (loops + 1)) as usize);
        for j in 0..=loops {
            let r = inner + (outer - inner) * f64::from(j) / f64::from(loops);
            for i in 0..=slices {
                let az = start.radians() + sweep.radians() * f64::from(i) / f64::from(slices);
                out.push(DVec3::new(r * az.sin(), r * az.cos(), 0.0));
            }
        }
        Ok(out)
    }

    /// Triangle indices for [`partial_disk`](Self::partial_disk). Outside faces up.
    pub fn partial_disk_indices(&self, slices: u32, loops: u32) -> Vec<u32> {
        grid_triangles(slices, loops, false, self.orientation == Orientation::Inside)
    }

    /// Flat wall along `azimuth` from `inner` to `outer` radius. Produces
    /// `(pillars + 1) x (stacks + 1)` vertices.
    pub fn radial_wall(
        &self,
        inner: f64,
        outer: f64,
        azimuth: Angle,
        pillars: u32,
        stacks: u32,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_radii(inner, outer)?;
        check_dimension("pillars", pillars)?;
        check_dimension("stacks", stacks)?;
        let (s, c) = azimuth.radians().sin_cos();
        let mut out = Vec::with_capacity(((pillars + 1) * (stacks + 1)) as usize);
        for j in 0..=stacks {
            let z = f64::from(j) / f64::from(stacks);
            for i in 0..=pillars {
                let r = inner + (outer - inner) * f64::from(i) / f64::from(pillars);
                out.push(DVec3::new(r * s, r * c, z));
            }
        }
        Ok(out)
    }

    /// Triangle indices for [`radial_wall`](Self::radial_wall). Outside faces
    /// clockwise (toward increasing azimuth).
    pub fn radial_wall_indices(&self, pillars: u32, stacks: u32) -> Vec<u32> {
        grid_triangles(pillars, stacks, false, self.orientation == Orientation::Inside)
    }

    // --- Stadium shapes ---

    /// Closed counter-clockwise perimeter of a stadium whose straight sides have
    /// `length` and whose round ends have `radius`, centered on the origin with
    /// its long axis along `heading` (clockwise from north). Each end gets
    /// `arc_slices` segments and each side `length_slices` segments.
    pub fn long_perimeter(
        &self,
        radius: f64,
        length: f64,
        heading: Angle,
        arc_slices: u32,
        length_slices: u32,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_measure("radius", radius)?;
        check_measure("length", length)?;
        check_dimension("arc_slices", arc_slices)?;
        check_dimension("length_slices", length_slices)?;

        let half = length / 2.0;
        let mut local = Vec::with_capacity((2 * (arc_slices + length_slices)) as usize);
        // Right side, A end to B end.
        for i in 0..length_slices {
            let t = f64::from(i) / f64::from(length_slices);
            local.push((-half + length * t, -radius));
        }
        // B end cap, from the right side around to the left side.
        for i in 0..arc_slices {
            let a = -std::f64::consts::FRAC_PI_2
                + std::f64::consts::PI * f64::from(i) / f64::from(arc_slices);
            local.push((half + radius * a.cos(), radius * a.sin()));
        }
        // Left side, B end to A end.
        for i in 0..length_slices {
            let t = f64::from(i) / f64::from(length_slices);
            local.push((half - length * t, radius));
        }
        // A end cap, from the left side back to the right side.
        for i in 0..arc_slices {
            let a = std::f64::consts::FRAC_PI_2
                + std::f64::consts::PI * f64::from(i) / f64::from(arc_slices);
            local.push((-half + radius * a.cos(), radius * a.sin()));
        }

        // Local (u along axis, w to the left) into east/north.
        let axis = DVec3::new(heading.sin(), heading.cos(), 0.0);
        let left = DVec3::new(-heading.cos(), heading.sin(), 0.0);
        Ok(local
            .into_iter()
            .map(|(u, w)| axis * u + left * w)
            .collect())
    }

    /// Wall of a stadium: `stacks + 1` copies of the perimeter at rising `z`.
    pub fn long_cylinder(
        &self,
        radius: f64,
        length: f64,
        heading: Angle,
        arc_slices: u32,
        length_slices: u32,
        stacks: u32,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_dimension("stacks", stacks)?;
        let ring = self.long_perimeter(radius, length, heading, arc_slices, length_slices)?;
        let mut out = Vec::with_capacity(ring.len() * (stacks + 1) as usize);
        for j in 0..=stacks {
            let z = f64::from(j) / f64::from(stacks);
            out.extend(ring.iter().map(|p| DVec3::new(p.x, p.y, z)));
        }
        Ok(out)
    }

    /// Triangle indices for [`long_cylinder`](Self::long_cylinder). Outside faces
    /// away from the axis.
    pub fn long_cylinder_indices(&self, arc_slices: u32, length_slices: u32, stacks: u32) -> Vec<u32> {
        let ring = 2 * (arc_slices + length_slices);
        // Counter-clockwise u and upward v give du x dv pointing outward.
        grid_triangles(ring, stacks, true, self.orientation == Orientation::Inside)
    }

    /// Flat stadium cap at `z = 0`: `loops + 1` perimeter rings whose end radius
    /// grows from zero to `radius`.
    pub fn long_disk(
        &self,
        radius: f64,
        length: f64,
        heading: Angle,
        arc_slices: u32,
        length_slices: u32,
        loops: u32,
    ) -> Result<Vec<DVec3>, GeometryError> {
        check_dimension("loops", loops)?;
        let mut out = Vec::new();
        for j in 0..=loops {
            let r = radius * f64::from(j) / f64::from(loops);
            out.extend(self.long_perimeter(r, length, heading, arc_slices, length_slices)?);
        }
        Ok(out)
    }

    /// Triangle indices for [`long_disk`](Self::long_disk). Outside faces up.
    pub fn long_disk_indices(&self, arc_slices: u32, length_slices: u32, loops: u32) -> Vec<u32> {
        let ring = 2 * (arc_slices + length_slices);
        // Counter-clockwise u and outward v give du x dv pointing down.
        grid_triangles(ring, loops, true, self.orientation == Orientation::Outside)
    }

    /// Line-loop segments around row `row` of a closed grid with `ring`
    /// vertices per row.
    pub fn closed_ring_outline_indices(&self, ring: u32, row: u32) -> Vec<u32> {
        let base = row * ring;
        (0..ring)
            .flat_map(|i| [base + i, base + (i + 1) % ring])
            .collect()
    }

    // --- Unit solids ---

    /// Corners of the axis-aligned unit cube centered on the origin.
    pub fn unit_box(&self) -> Vec<DVec3> {
        let h = 0.5;
        vec![
            DVec3::new(-h, -h, -h),
            DVec3::new(h, -h, -h),
            DVec3::new(h, h, -h),
            DVec3::new(-h, h, -h),
            DVec3::new(-h, -h, h),
            DVec3::new(h, -h, h),
            DVec3::new(h, h, h),
            DVec3::new(-h, h, h),
        ]
    }

    /// Twelve triangles of [`unit_box`](Self::unit_box).
    pub fn unit_box_indices(&self) -> Vec<u32> {
        let mut out = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        if self.orientation == Orientation::Inside {
            flip_triangles(&mut out);
        }
        out
    }

    // --- Normals ---

    /// Area-weighted vertex normals accumulated from indexed triangles.
    pub fn compute_normals(&self, vertices: &[DVec3], indices: &[u32]) -> Vec<DVec3> {
        let mut normals = vec![DVec3::ZERO; vertices.len()];
        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
                continue;
            }
            let n = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(DVec3::ZERO))
            .collect()
    }
}

/// Triangles covering a grid of `cols x rows` cells. `closed` wraps the last
/// column onto the first. Unflipped triangles face along `du x dv`.
fn grid_triangles(cols: u32, rows: u32, closed: bool, flip: bool) -> Vec<u32> {
    let stride = if closed { cols } else { cols + 1 };
    let mut out = Vec::with_capacity((cols * rows * 6) as usize);
    for j in 0..rows {
        for i in 0..cols {
            let i1 = if closed { (i + 1) % cols } else { i + 1 };
            let a = j * stride + i;
            let b = j * stride + i1;
            let c = (j + 1) * stride + i;
            let d = (j + 1) * stride + i1;
            out.extend([a, b, d, a, d, c]);
        }
    }
    if flip {
        flip_triangles(&mut out);
    }
    out
}

fn flip_triangles(indices: &mut [u32]) {
    for tri in indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
}

fn check_dimension(name: &'static str, value: u32) -> Result<(), GeometryError> {
    if value == 0 {
        return Err(GeometryError::InvalidDimension { name, value });
    }
    Ok(())
}

fn check_measure(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GeometryError::InvalidMeasure { name, value });
    }
    Ok(())
}

fn check_radii(inner: f64, outer: f64) -> Result<(), GeometryError> {
    check_measure("inner radius", inner)?;
    check_measure("outer radius", outer)?;
    if inner > outer {
        return Err(GeometryError::InvertedRadii { inner, outer });
    }
    Ok(())
}
