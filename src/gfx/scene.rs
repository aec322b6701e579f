//! Arena of visual nodes and the setter surface the engine drives.

use super::camera::Camera;
use super::math::{Color, Mat4, Vec3};
use crate::engine::target::{Attribute, AttributeKind, ObjectId, Target, VisualTarget};
use crate::error::EngineError;
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Stroked path through the node's points.
    Polyline { closed: bool },
    /// Text placed at the node's origin.
    Label { text: String, size: f32 },
    /// Holds children only. Transforms and styles propagate to them.
    Group,
}

#[derive(Debug, Clone)]
pub struct VisualNode {
    pub name: String,
    pub shape: Shape,
    /// Geometry in local coordinates.
    pub points: Vec<Vec3>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub pivot: Vec3,
    pub color: Color,
    pub stroke_width: f32,
    pub opacity: f32,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
}

impl VisualNode {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            points: Vec::new(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            pivot: Vec3::ZERO,
            color: Color::WHITE,
            stroke_width: 4.0,
            opacity: 1.0,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_points(mut self, points: Vec<Vec3>) -> Self {
        self.points = points;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn is_group(&self) -> bool {
        self.shape == Shape::Group
    }

    /// Translation after rotation about the pivot.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::translation(self.position).mul(&Mat4::rotation_about(self.rotation, self.pivot))
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<VisualNode>,
    pub camera: Camera,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            nodes: Vec::new(),
            camera,
        }
    }

    pub fn add(&mut self, node: VisualNode) -> ObjectId {
        let id = ObjectId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Adds a group node and parents `children` to it.
    pub fn add_group(&mut self, name: impl Into<String>, children: &[ObjectId]) -> Result<ObjectId, EngineError> {
        let id = self.add(VisualNode::new(name, Shape::Group));
        for &child in children {
            self.attach(id, child)?;
        }
        Ok(id)
    }

    /// Moves `child` under `parent`, detaching it from its previous parent.
    pub fn attach(&mut self, parent: ObjectId, child: ObjectId) -> Result<(), EngineError> {
        self.check(parent)?;
        self.check(child)?;
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(EngineError::InvalidBinding(format!(
                "attaching {} under {} would form a cycle",
                child, parent
            )));
        }
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn add_polyline(&mut self, name: impl Into<String>, points: Vec<Vec3>, color: Color) -> ObjectId {
        self.add(
            VisualNode::new(name, Shape::Polyline { closed: false })
                .with_points(points)
                .with_color(color),
        )
    }

    pub fn add_label(&mut self, text: impl Into<String>, size: f32, at: Vec3, color: Color) -> ObjectId {
        let text = text.into();
        self.add(
            VisualNode::new(text.clone(), Shape::Label { text, size })
                .at(at)
                .with_color(color),
        )
    }

    /// Wireframe box: one closed face outline per side, grouped.
    pub fn add_cuboid(&mut self, name: impl Into<String>, size: Vec3, color: Color) -> Result<ObjectId, EngineError> {
        let h = size.scale(0.5);
        let corner = |sx: f32, sy: f32, sz: f32| Vec3::new(sx * h.x, sy * h.y, sz * h.z);
        let faces = [
            [corner(-1.0, -1.0, 1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0)],
            [corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(-1.0, 1.0, -1.0)],
            [corner(-1.0, -1.0, -1.0), corner(-1.0, -1.0, 1.0), corner(-1.0, 1.0, 1.0), corner(-1.0, 1.0, -1.0)],
            [corner(1.0, -1.0, -1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(1.0, 1.0, -1.0)],
        ];
        let name = name.into();
        let faces: Vec<ObjectId> = faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                self.add(
                    VisualNode::new(format!("{}.face{}", name, i), Shape::Polyline { closed: true })
                        .with_points(face.to_vec())
                        .with_color(color),
                )
            })
            .collect();
        self.add_group(name, &faces)
    }

    /// Shaft plus a two-stroke head, grouped.
    pub fn add_arrow(&mut self, name: impl Into<String>, start: Vec3, end: Vec3, color: Color) -> Result<ObjectId, EngineError> {
        let name = name.into();
        let dir = (end - start).normalize();
        let side = dir.cross(&Vec3::OUT);
        let side = if side.length() < 1e-6 { dir.cross(&Vec3::UP) } else { side };
        let tip = 0.2;
        let back = end - dir.scale(tip);
        let shaft = self.add_polyline(format!("{}.shaft", name), vec![start, end], color);
        let head = self.add_polyline(
            format!("{}.head", name),
            vec![back + side.scale(tip * 0.5), end, back - side.scale(tip * 0.5)],
            color,
        );
        self.add_group(name, &[shaft, head])
    }

    pub fn get(&self, id: ObjectId) -> Option<&VisualNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut VisualNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.nodes.len()).map(ObjectId)
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Nearest first.
    pub fn ancestors(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = self.get(id).map(|n| n.children.clone()).unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// Local-to-world transform through the parent chain.
    pub fn world_matrix(&self, id: ObjectId) -> Mat4 {
        let mut m = match self.get(id) {
            Some(node) => node.local_matrix(),
            None => return Mat4::identity(),
        };
        for ancestor in self.ancestors(id) {
            if let Some(node) = self.get(ancestor) {
                m = node.local_matrix().mul(&m);
            }
        }
        m
    }

    /// Transform from `id` up to and including `root`. Ancestors above
    /// `root` do not contribute.
    pub fn matrix_below(&self, id: ObjectId, root: ObjectId) -> Mat4 {
        let mut m = match self.get(id) {
            Some(node) => node.local_matrix(),
            None => return Mat4::identity(),
        };
        if id == root {
            return m;
        }
        for ancestor in self.ancestors(id) {
            if let Some(node) = self.get(ancestor) {
                m = node.local_matrix().mul(&m);
            }
            if ancestor == root {
                break;
            }
        }
        m
    }

    pub fn world_points(&self, id: ObjectId) -> Vec<Vec3> {
        let m = self.world_matrix(id);
        self.get(id)
            .map(|n| n.points.iter().map(|p| m.transform_point(*p)).collect())
            .unwrap_or_default()
    }

    /// Opacity multiplied down the parent chain.
    pub fn effective_opacity(&self, id: ObjectId) -> f32 {
        let own = self.get(id).map_or(0.0, |n| n.opacity);
        self.ancestors(id)
            .iter()
            .filter_map(|a| self.get(*a))
            .fold(own, |acc, n| acc * n.opacity)
    }

    /// Bakes `m` into a node's geometry, recursing into groups.
    pub fn apply_transform(&mut self, id: ObjectId, m: &Mat4) -> Result<(), EngineError> {
        self.check(id)?;
        let mut targets = vec![id];
        targets.extend(self.descendants(id));
        for target in targets {
            let node = &mut self.nodes[target.0];
            for p in &mut node.points {
                *p = m.transform_point(*p);
            }
        }
        Ok(())
    }

    /// Recolors a node and every descendant.
    pub fn set_color_recursive(&mut self, id: ObjectId, color: Color) -> Result<(), EngineError> {
        self.check(id)?;
        let mut targets = vec![id];
        targets.extend(self.descendants(id));
        for target in targets {
            self.nodes[target.0].color = color;
        }
        Ok(())
    }

    fn check(&self, id: ObjectId) -> Result<(), EngineError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(EngineError::UnknownObject(id.0))
        }
    }

    fn node_mut(&mut self, id: ObjectId) -> Result<&mut VisualNode, EngineError> {
        self.nodes.get_mut(id.0).ok_or(EngineError::UnknownObject(id.0))
    }
}

impl VisualTarget for Scene {
    fn set_points(&mut self, id: ObjectId, points: Vec<Vec3>) -> Result<(), EngineError> {
        self.node_mut(id)?.points = points;
        Ok(())
    }

    fn set_position(&mut self, id: ObjectId, position: Vec3) -> Result<(), EngineError> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    fn set_rotation(&mut self, id: ObjectId, angles: Vec3) -> Result<(), EngineError> {
        self.node_mut(id)?.rotation = angles;
        Ok(())
    }

    fn set_color(&mut self, id: ObjectId, color: Color) -> Result<(), EngineError> {
        self.set_color_recursive(id, color)
    }

    fn set_stroke_width(&mut self, id: ObjectId, width: f32) -> Result<(), EngineError> {
        self.check(id)?;
        let mut targets = vec![id];
        targets.extend(self.descendants(id));
        for target in targets {
            self.nodes[target.0].stroke_width = width;
        }
        Ok(())
    }

    fn set_opacity(&mut self, id: ObjectId, opacity: f32) -> Result<(), EngineError> {
        self.node_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_orientation(&mut self, phi: f32, theta: f32) {
        debug!("camera phi={:.3} theta={:.3}", phi, theta);
        self.camera.set_orientation(phi, theta);
    }

    fn attribute(&self, target: Target, kind: AttributeKind) -> Option<Attribute> {
        let id = match target {
            Target::Camera => {
                return (kind == AttributeKind::Orientation).then(|| Attribute::Orientation {
                    phi: self.camera.phi,
                    theta: self.camera.theta,
                });
            }
            Target::Object(id) => id,
        };
        let node = self.get(id)?;
        Some(match kind {
            AttributeKind::Points => Attribute::Points(node.points.clone()),
            AttributeKind::Position => Attribute::Position(node.position),
            AttributeKind::Rotation => Attribute::Rotation(node.rotation),
            AttributeKind::Color => Attribute::Color(node.color),
            AttributeKind::StrokeWidth => Attribute::StrokeWidth(node.stroke_width),
            AttributeKind::Opacity => Attribute::Opacity(node.opacity),
            AttributeKind::Orientation => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn square() -> Vec<Vec3> {
        vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_group_transform_propagates() {
        let mut scene = Scene::default();
        let line = scene.add_polyline("line", vec![Vec3::RIGHT], Color::WHITE);
        let group = scene.add_group("g", &[line]).unwrap();
        scene.set_position(group, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        scene.set_rotation(group, Vec3::new(0.0, 0.0, FRAC_PI_2)).unwrap();

        let world = scene.world_points(line);
        assert!(world[0].approx_eq(&Vec3::new(0.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_matrix_below_stops_at_root() {
        let mut scene = Scene::default();
        let line = scene.add_polyline("line", vec![Vec3::RIGHT], Color::WHITE);
        let inner = scene.add_group("inner", &[line]).unwrap();
        let outer = scene.add_group("outer", &[inner]).unwrap();
        scene.set_position(inner, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        scene.set_position(outer, Vec3::new(10.0, 0.0, 0.0)).unwrap();

        let below = scene.matrix_below(line, inner).transform_point(Vec3::RIGHT);
        assert!(below.approx_eq(&Vec3::new(1.0, 2.0, 0.0), 1e-6));
        let world = scene.world_matrix(line).transform_point(Vec3::RIGHT);
        assert!(world.approx_eq(&Vec3::new(11.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_color_and_stroke_reach_descendants() {
        let mut scene = Scene::default();
        let cube = scene.add_cuboid("cube", Vec3::new(2.0, 1.0, 0.5), Color::WHITE).unwrap();
        let red = Color::rgba(255, 0, 0, 255);
        scene.set_color(cube, red).unwrap();
        scene.set_stroke_width(cube, 8.0).unwrap();
        for face in scene.descendants(cube) {
            assert_eq!(scene.get(face).unwrap().color, red);
            assert_eq!(scene.get(face).unwrap().stroke_width, 8.0);
        }
        assert_eq!(scene.descendants(cube).len(), 4);
    }

    #[test]
    fn test_effective_opacity() {
        let mut scene = Scene::default();
        let a = scene.add_polyline("a", square(), Color::WHITE);
        let g = scene.add_group("g", &[a]).unwrap();
        scene.set_opacity(g, 0.5).unwrap();
        scene.set_opacity(a, 0.5).unwrap();
        assert!((scene.effective_opacity(a) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_object() {
        let mut scene = Scene::default();
        assert_eq!(
            scene.set_position(ObjectId(3), Vec3::ZERO),
            Err(EngineError::UnknownObject(3))
        );
    }

    #[test]
    fn test_attach_rejects_cycle() {
        let mut scene = Scene::default();
        let a = scene.add_polyline("a", square(), Color::WHITE);
        let g = scene.add_group("g", &[a]).unwrap();
        assert!(scene.attach(a, g).is_err());
        assert_eq!(scene.ancestors(a), vec![g]);
    }

    #[test]
    fn test_attribute_reads_back() {
        let mut scene = Scene::default();
        let a = scene.add_label("Rest", 0.6, Vec3::new(0.0, 3.0, 0.0), Color::WHITE);
        assert_eq!(
            scene.attribute(Target::Object(a), AttributeKind::Position),
            Some(Attribute::Position(Vec3::new(0.0, 3.0, 0.0)))
        );
        scene.set_orientation(1.0, -0.5);
        assert_eq!(
            scene.attribute(Target::Camera, AttributeKind::Orientation),
            Some(Attribute::Orientation { phi: 1.0, theta: -0.5 })
        );
    }

    #[test]
    fn test_apply_transform_bakes_geometry() {
        let mut scene = Scene::default();
        let a = scene.add_polyline("a", vec![Vec3::RIGHT], Color::WHITE);
        scene
            .apply_transform(a, &Mat4::translation(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        assert_eq!(scene.get(a).unwrap().points[0], Vec3::new(1.0, 1.0, 0.0));
    }
}
