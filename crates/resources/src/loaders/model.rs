//! glTF 2.0 model loading (`.glb` binary container or `.gltf` JSON).
//!
//! Only the scene structure is imported: node hierarchy, per-mesh vertex and
//! index counts, materials and their base colour textures. Vertex data stays
//! in the container.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use glam::{EulerRot, Quat, Vec3};
use gltf::{Document, Gltf};
use scenekit_common::{ResourceKind, Transform};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

use super::texture::Texture;
use crate::error::ResourceError;
use crate::loader::ResourceLoader;
use crate::options::{LoadOptions, ModelOptions, TextureOptions};
use crate::source::AssetSource;

/// Approximate bytes per vertex (position + normal + uv + tangent).
const VERTEX_STRIDE: usize = 32;

/// Vertex/index counts of one mesh, standing in for its GPU buffers.
#[derive(Debug)]
pub struct Geometry {
    pub vertex_count: u32,
    pub index_count: u32,
    disposed: Cell<bool>,
}

impl Geometry {
    pub fn new(vertex_count: u32, index_count: u32) -> Self {
        Self {
            vertex_count,
            index_count,
            disposed: Cell::new(false),
        }
    }

    pub fn byte_size(&self) -> usize {
        self.vertex_count as usize * VERTEX_STRIDE + self.index_count as usize * 4
    }

    pub fn dispose(&self) {
        self.disposed.set(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    /// Base colour texture.
    pub map: Option<Rc<Texture>>,
    disposed: Cell<bool>,
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: [f32; 4], map: Option<Rc<Texture>>) -> Self {
        Self {
            name: name.into(),
            base_color,
            map,
            disposed: Cell::new(false),
        }
    }

    /// Dispose the material and any texture it samples. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(map) = &self.map {
            map.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// A mesh's material binding: one material, or one per primitive.
#[derive(Debug)]
pub enum MaterialSlot {
    Single(Rc<Material>),
    Multiple(Vec<Rc<Material>>),
}

impl MaterialSlot {
    pub fn materials(&self) -> &[Rc<Material>] {
        match self {
            MaterialSlot::Single(m) => std::slice::from_ref(m),
            MaterialSlot::Multiple(ms) => ms,
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub geometry: Geometry,
    pub material: MaterialSlot,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    fn visit_meshes<'a>(&'a self, out: &mut Vec<&'a Mesh>) {
        if let Some(mesh) = &self.mesh {
            out.push(mesh);
        }
        for child in &self.children {
            child.visit_meshes(out);
        }
    }
}

/// An imported glTF scene.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    /// Synthetic root carrying the placement from [`ModelOptions`].
    pub root: ModelNode,
    pub textures: Vec<Rc<Texture>>,
    disposed: Cell<bool>,
}

impl Model {
    /// Every mesh in depth-first order.
    pub fn meshes(&self) -> Vec<&Mesh> {
        let mut out = Vec::new();
        self.root.visit_meshes(&mut out);
        out
    }

    pub fn byte_size(&self) -> usize {
        let geometry: usize = self.meshes().iter().map(|m| m.geometry.byte_size()).sum();
        let textures: usize = self.textures.iter().map(|t| t.byte_size()).sum();
        geometry + textures
    }

    /// Dispose every mesh's geometry and materials, including their textures.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        for mesh in self.meshes() {
            mesh.geometry.dispose();
            for material in mesh.material.materials() {
                material.dispose();
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// Resolve `uri` against the directory of `base_url`.
fn resolve_relative(base_url: &str, uri: &str) -> String {
    match base_url.rfind('/') {
        Some(i) => format!("{}/{}", &base_url[..i], uri),
        None => uri.to_string(),
    }
}

fn node_transform(node: &gltf::Node<'_>) -> Transform {
    let (translation, rotation, scale) = node.transform().decomposed();
    Transform {
        position: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    }
}

/// Element count of an accessor, clamped to `u32`.
fn accessor_count(accessor: Option<gltf::Accessor<'_>>) -> u32 {
    accessor.map_or(0, |a| u32::try_from(a.count()).unwrap_or(u32::MAX))
}

/// Bytes covered by `view`, or `None` when its buffer was not loaded.
fn view_bytes<'b>(
    url: &str,
    view: &gltf::buffer::View<'_>,
    buffers: &'b [Option<Vec<u8>>],
) -> Result<Option<&'b [u8]>, ResourceError> {
    let Some(data) = buffers.get(view.buffer().index()).and_then(Option::as_deref) else {
        return Ok(None);
    };
    let start = view.offset();
    start
        .checked_add(view.length())
        .and_then(|end| data.get(start..end))
        .map(Some)
        .ok_or_else(|| ResourceError::load_failure(url, "buffer view out of range"))
}

/// Builds the node tree once textures have been resolved.
struct SceneBuilder<'a> {
    url: &'a str,
    doc: &'a Document,
    options: &'a ModelOptions,
    materials: Vec<Rc<Material>>,
    default_material: Rc<Material>,
}

impl<'a> SceneBuilder<'a> {
    fn new(
        url: &'a str,
        doc: &'a Document,
        options: &'a ModelOptions,
        images: &[Option<Rc<Texture>>],
    ) -> Self {
        let materials = doc
            .materials()
            .enumerate()
            .map(|(i, material)| {
                let pbr = material.pbr_metallic_roughness();
                let map = pbr
                    .base_color_texture()
                    .and_then(|info| images.get(info.texture().source().index()).cloned().flatten());
                Rc::new(Material::new(
                    material.name().map_or_else(|| format!("material_{i}"), str::to_string),
                    pbr.base_color_factor(),
                    map,
                ))
            })
            .collect();
        Self {
            url,
            doc,
            options,
            materials,
            default_material: Rc::new(Material::new("default", [1.0, 1.0, 1.0, 1.0], None)),
        }
    }

    /// Nodes of the default scene, or every unreferenced node when the
    /// document declares no scene.
    fn roots(&self) -> Vec<gltf::Node<'a>> {
        if let Some(scene) = self.doc.default_scene().or_else(|| self.doc.scenes().next()) {
            return scene.nodes().collect();
        }
        let referenced: HashSet<usize> = self
            .doc
            .nodes()
            .flat_map(|n| n.children().map(|c| c.index()))
            .collect();
        self.doc
            .nodes()
            .filter(|n| !referenced.contains(&n.index()))
            .collect()
    }

    fn build(&self, name: String) -> Result<ModelNode, ResourceError> {
        let mut stack = Vec::new();
        let children = self
            .roots()
            .into_iter()
            .map(|node| self.build_node(node, &mut stack))
            .collect::<Result<Vec<_>, _>>()?;
        let r = self.options.rotation;
        Ok(ModelNode {
            name,
            transform: Transform {
                position: self.options.position,
                rotation: Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z),
                scale: self.options.scale,
            },
            mesh: None,
            children,
        })
    }

    fn build_node(
        &self,
        node: gltf::Node<'a>,
        stack: &mut Vec<usize>,
    ) -> Result<ModelNode, ResourceError> {
        let index = node.index();
        if stack.contains(&index) {
            return Err(ResourceError::load_failure(self.url, "node hierarchy contains a cycle"));
        }
        stack.push(index);
        let children = node
            .children()
            .map(|child| self.build_node(child, stack))
            .collect::<Result<Vec<_>, _>>()?;
        stack.pop();

        Ok(ModelNode {
            name: node.name().map_or_else(|| format!("node_{index}"), str::to_string),
            transform: node_transform(&node),
            mesh: node.mesh().map(|m| self.build_mesh(m)),
            children,
        })
    }

    fn build_mesh(&self, mesh: gltf::Mesh<'a>) -> Mesh {
        let mut vertex_count = 0u32;
        let mut index_count = 0u32;
        let mut materials = Vec::new();
        for prim in mesh.primitives() {
            vertex_count =
                vertex_count.saturating_add(accessor_count(prim.get(&gltf::Semantic::Positions)));
            index_count = index_count.saturating_add(accessor_count(prim.indices()));
            let material = prim
                .material()
                .index()
                .and_then(|m| self.materials.get(m))
                .unwrap_or(&self.default_material);
            materials.push(Rc::clone(material));
        }
        let material = if materials.len() == 1 {
            MaterialSlot::Single(materials.remove(0))
        } else if materials.is_empty() {
            MaterialSlot::Single(Rc::clone(&self.default_material))
        } else {
            MaterialSlot::Multiple(materials)
        };
        Mesh {
            name: mesh
                .name()
                .map_or_else(|| format!("mesh_{}", mesh.index()), str::to_string),
            geometry: Geometry::new(vertex_count, index_count),
            material,
            cast_shadow: self.options.cast_shadow,
            receive_shadow: self.options.receive_shadow,
        }
    }
}

/// Loads glTF scenes as [`Model`]s.
pub struct ModelLoader {
    source: Rc<dyn AssetSource>,
}

impl ModelLoader {
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        Self { source }
    }

    /// Bytes of every buffer, indexed like the document's buffers. The GLB
    /// binary chunk fills the buffer without a URI; external buffers are
    /// fetched next to the model.
    async fn load_buffers(
        &self,
        url: &str,
        doc: &Document,
        mut blob: Option<Vec<u8>>,
    ) -> Result<Vec<Option<Vec<u8>>>, ResourceError> {
        let mut buffers = Vec::new();
        for buffer in doc.buffers() {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => blob.take(),
                gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                    tracing::warn!(url, buffer = buffer.index(), "data URI buffers are not supported");
                    None
                }
                gltf::buffer::Source::Uri(uri) => {
                    Some(self.source.fetch(&resolve_relative(url, uri)).await?)
                }
            };
            buffers.push(data);
        }
        Ok(buffers)
    }

    /// Decode every image the document declares. Images that can't be
    /// reached (data URIs, missing buffers) are skipped with a warning.
    async fn load_images(
        &self,
        url: &str,
        doc: &Document,
        buffers: &[Option<Vec<u8>>],
    ) -> Result<Vec<Option<Rc<Texture>>>, ResourceError> {
        let options = TextureOptions::default();
        let mut images = Vec::new();
        for image in doc.images() {
            let name = format!("{url}#image{}", image.index());
            let texture = match image.source() {
                gltf::image::Source::View { view, .. } => view_bytes(url, &view, buffers)?
                    .map(|bytes| Texture::decode(&name, bytes, &options))
                    .transpose()?,
                gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => None,
                gltf::image::Source::Uri { uri, .. } => {
                    let bytes = self.source.fetch(&resolve_relative(url, uri)).await?;
                    Some(Texture::decode(&name, &bytes, &options)?)
                }
            };
            if texture.is_none() {
                tracing::warn!(%name, "image data unavailable, material left untextured");
            }
            images.push(texture.map(Rc::new));
        }
        Ok(images)
    }
}

impl ResourceLoader for ModelLoader {
    type Asset = Model;

    fn kind(&self) -> &str {
        ResourceKind::MODEL
    }

    fn load<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Model, ResourceError>> {
        async move {
            let extension = Path::new(url)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();
            if extension != "glb" && extension != "gltf" {
                return Err(ResourceError::UnsupportedFormat {
                    url: url.to_string(),
                    extension,
                });
            }

            let bytes = self.source.fetch(url).await?;
            let Gltf { document, blob } = Gltf::from_slice(&bytes)
                .map_err(|e| ResourceError::load_failure(url, format!("invalid glTF: {e}")))?;

            let buffers = self.load_buffers(url, &document, blob).await?;
            let images = self.load_images(url, &document, &buffers).await?;
            let name = Path::new(url)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(url)
                .to_string();
            let root =
                SceneBuilder::new(url, &document, &options.model, &images).build(name.clone())?;

            let model = Model {
                name,
                root,
                textures: images.into_iter().flatten().collect(),
                disposed: Cell::new(false),
            };
            tracing::debug!(url, meshes = model.meshes().len(), "model imported");
            Ok(model)
        }
        .boxed_local()
    }

    fn unload(&self, model: &Model) {
        model.dispose();
    }

    fn approx_size(&self, model: &Model) -> usize {
        model.byte_size()
    }
}
