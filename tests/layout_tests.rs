//! Memory Layout Tests
//!
//! Tests for:
//! - Primitive sizes and alignment (vec3 padding, matrix columns)
//! - Struct field offsets and trailing padding
//! - Open arrays and buffer byte sizes
//! - Path resolution and its error cases
//! - Vertex layouts

use myth_gpu::{Error, MemoryLayout, Multiplier, ScalarFormat, VertexLayout};

// ============================================================================
// Primitives
// ============================================================================

#[test]
fn vec3_aligns_like_vec4() {
    let vec3 = MemoryLayout::vec3f();
    assert_eq!(vec3.fixed_size(), 12);
    assert_eq!(vec3.alignment(), 16);
}

#[test]
fn matrix_columns_are_padded_to_vector_alignment() {
    let mat3 = MemoryLayout::mat3x3f();
    assert_eq!(mat3.fixed_size(), 48);
    assert_eq!(mat3.alignment(), 16);

    let column = mat3.locate("[1]").unwrap();
    assert_eq!((column.offset, column.size), (16, 12));
}

#[test]
fn matrix_dimensions_are_validated() {
    let result = MemoryLayout::primitive(ScalarFormat::F32, Multiplier::Mat { columns: 5, rows: 4 });
    assert!(matches!(result, Err(Error::InvalidLayout(_))));

    let mat2x3 =
        MemoryLayout::primitive(ScalarFormat::F32, Multiplier::Mat { columns: 2, rows: 3 }).unwrap();
    assert_eq!(mat2x3.fixed_size(), 32);
}

// ============================================================================
// Structs
// ============================================================================

#[test]
fn struct_fields_follow_alignment() {
    let layout = MemoryLayout::structure([
        ("a", MemoryLayout::vec4f()),
        ("b", MemoryLayout::f32()),
    ])
    .unwrap();

    let a = layout.locate("a").unwrap();
    let b = layout.locate("b").unwrap();
    assert_eq!((a.offset, a.size), (0, 16));
    assert_eq!((b.offset, b.size), (16, 4));
    assert_eq!(layout.alignment(), 16);
    assert_eq!(layout.fixed_size(), 32);
}

#[test]
fn scalar_packs_after_vec3() {
    let layout = MemoryLayout::structure([
        ("direction", MemoryLayout::vec3f()),
        ("intensity", MemoryLayout::f32()),
    ])
    .unwrap();

    assert_eq!(layout.locate("intensity").unwrap().offset, 12);
    assert_eq!(layout.fixed_size(), 16);
}

#[test]
fn struct_size_is_multiple_of_alignment() {
    let layouts = [
        MemoryLayout::structure([("x", MemoryLayout::vec3f())]).unwrap(),
        MemoryLayout::structure([("m", MemoryLayout::mat4x4f()), ("s", MemoryLayout::u32())]).unwrap(),
        MemoryLayout::structure([("a", MemoryLayout::f32()), ("b", MemoryLayout::vec2f())]).unwrap(),
    ];
    for layout in &layouts {
        assert_eq!(layout.fixed_size() % layout.alignment(), 0, "{layout:?}");
    }
}

#[test]
fn duplicate_field_names_are_rejected() {
    let result = MemoryLayout::structure([
        ("a", MemoryLayout::f32()),
        ("a", MemoryLayout::u32()),
    ]);
    assert!(matches!(result, Err(Error::DuplicateIdentifier(_))));
}

#[test]
fn open_field_must_be_last() {
    let tail = MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap();
    let result = MemoryLayout::structure([("items", tail), ("count", MemoryLayout::u32())]);
    assert!(matches!(result, Err(Error::InvalidLayout(_))));
}

// ============================================================================
// Arrays & Byte Sizes
// ============================================================================

#[test]
fn open_tail_scales_with_element_count() {
    let layout = MemoryLayout::structure([
        ("header", MemoryLayout::vec4f()),
        ("items", MemoryLayout::open_array(MemoryLayout::vec4f()).unwrap()),
    ])
    .unwrap();

    assert_eq!(layout.fixed_size(), 16);
    assert_eq!(layout.variable_size(), 16);
    assert_eq!(layout.byte_size(3), 64);
    assert_eq!(layout.min_binding_size(), 32);
}

#[test]
fn byte_size_rounds_to_copy_alignment() {
    let indices = MemoryLayout::indices(wgpu::IndexFormat::Uint16);
    assert_eq!(indices.byte_size(3), 8);
    assert_eq!(indices.element_capacity(3), 3);
    assert_eq!(indices.index_format(), Some(wgpu::IndexFormat::Uint16));
}

#[test]
fn fixed_array_stride_includes_padding() {
    let layout = MemoryLayout::fixed_array(MemoryLayout::vec3f(), 4).unwrap();
    assert_eq!(layout.fixed_size(), 64);
    assert!(!layout.is_open());

    let third = layout.locate("[2]").unwrap();
    assert_eq!((third.offset, third.size), (32, 12));
}

#[test]
fn open_array_elements_must_be_fixed() {
    let inner = MemoryLayout::open_array(MemoryLayout::f32()).unwrap();
    assert!(matches!(MemoryLayout::open_array(inner), Err(Error::InvalidLayout(_))));
}

// ============================================================================
// Path Resolution
// ============================================================================

fn lights() -> MemoryLayout {
    let light = MemoryLayout::structure([
        ("position", MemoryLayout::vec3f()),
        ("range", MemoryLayout::f32()),
        ("color", MemoryLayout::vec4f()),
    ])
    .unwrap();
    MemoryLayout::structure([
        ("count", MemoryLayout::u32()),
        ("lights", MemoryLayout::open_array(light).unwrap()),
    ])
    .unwrap()
}

#[test]
fn nested_paths_resolve() {
    let layout = lights();
    let color = layout.locate("lights[2].color").unwrap();
    assert_eq!((color.offset, color.size), (16 + 2 * 32 + 16, 16));

    let component = layout.locate("lights[0].color[3]").unwrap();
    assert_eq!((component.offset, component.size), (16 + 16 + 12, 4));
}

#[test]
fn addressing_open_node_is_open_size() {
    let layout = lights();
    assert!(matches!(layout.locate("lights"), Err(Error::OpenSize(_))));
    assert!(matches!(layout.locate(""), Err(Error::OpenSize(_))));
}

#[test]
fn bad_paths_are_invalid() {
    let layout = lights();
    for path in ["missing", "count[0]", "lights[0].color.x", "lights[x]", "lights[1", ".count"] {
        assert!(
            matches!(layout.locate(path), Err(Error::InvalidPath { .. })),
            "{path} should be rejected"
        );
    }
}

#[test]
fn fixed_array_index_is_bounds_checked() {
    let layout = MemoryLayout::fixed_array(MemoryLayout::f32(), 2).unwrap();
    assert!(layout.locate("[1]").is_ok());
    assert!(matches!(layout.locate("[2]"), Err(Error::InvalidPath { .. })));
}

// ============================================================================
// Vertex Layouts
// ============================================================================

#[test]
fn vertex_attributes_pack_tightly() {
    let vertex = VertexLayout::builder(wgpu::VertexStepMode::Vertex)
        .attribute("position", wgpu::VertexFormat::Float32x3)
        .attribute("uv", wgpu::VertexFormat::Float32x2)
        .build()
        .unwrap();
    assert_eq!(vertex.stride(), 20);
    assert_eq!(vertex.attribute("uv").unwrap().offset(), 12);

    let layout = MemoryLayout::from(vertex);
    assert!(layout.is_open());
    assert_eq!(layout.byte_size(3), 60);

    let uv = layout.locate("[2].uv").unwrap();
    assert_eq!((uv.offset, uv.size), (52, 8));
    assert!(matches!(layout.locate("[0].normal"), Err(Error::InvalidPath { .. })));
}

#[test]
fn vertex_stride_must_be_multiple_of_four() {
    let result = VertexLayout::builder(wgpu::VertexStepMode::Instance)
        .attribute("id", wgpu::VertexFormat::Uint16)
        .build();
    assert!(matches!(result, Err(Error::InvalidLayout(_))));

    let padded = VertexLayout::builder(wgpu::VertexStepMode::Instance)
        .attribute("id", wgpu::VertexFormat::Uint16x2)
        .attribute_at("weight", wgpu::VertexFormat::Float32, 4)
        .build()
        .unwrap();
    assert_eq!(padded.attribute("weight").unwrap().offset(), 8);
    assert_eq!(padded.stride(), 12);
}

#[test]
fn duplicate_attributes_are_rejected() {
    let result = VertexLayout::builder(wgpu::VertexStepMode::Vertex)
        .attribute("position", wgpu::VertexFormat::Float32x3)
        .attribute("position", wgpu::VertexFormat::Float32x3)
        .build();
    assert!(matches!(result, Err(Error::DuplicateIdentifier(_))));
}
