//! Little-endian record builders shared by unit and integration tests
//!
//! Compiled into the library's test build and into the integration test
//! binary, so it only depends on the standard library.

#![allow(dead_code)]

/// Joint record size in a bone block
pub const JOINT_RECORD_SIZE: usize = 0x40;
/// Animation block header size
pub const ANIMATION_HEADER_SIZE: usize = 0x1C;
/// Animation subheader size
pub const ANIMATION_SUBHEADER_SIZE: usize = 0x10;
/// Identifier at the start of every animation block
pub const ANIMATION_IDENTIFIER: u32 = 0x1A54_4F4D;
/// Keyframe record size
pub const KEYFRAME_RECORD_SIZE: usize = 0x10;

/// Bind-pose values for one joint record
#[derive(Debug, Clone, Copy)]
pub struct JointSpec {
    pub id: u16,
    pub scale: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [i32; 3],
}

impl JointSpec {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            scale: [1.0; 3],
            position: [0.0; 3],
            rotation: [0; 3],
        }
    }

    pub fn scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub fn position(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: [i32; 3]) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Bone block with records stored in insertion order
#[derive(Debug, Default)]
pub struct BoneBlockBuilder {
    joints: Vec<JointSpec>,
    children: Vec<Vec<usize>>,
}

impl BoneBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the root; it must be added first
    pub fn root(&mut self, spec: JointSpec) -> usize {
        self.joints.push(spec);
        self.children.push(Vec::new());
        self.joints.len() - 1
    }

    pub fn child(&mut self, parent: usize, spec: JointSpec) -> usize {
        let index = self.root(spec);
        self.children[parent].push(index);
        index
    }

    /// Single-child chain of `len` joints with IDs counting up from zero
    pub fn chain(len: usize) -> Self {
        let mut bones = Self::new();
        let mut parent = bones.root(JointSpec::new(0));
        for id in 1..len {
            parent = bones.child(parent, JointSpec::new(id as u16));
        }
        bones
    }

    /// Root with `len - 1` direct children linked as one sibling list
    pub fn fan(len: usize) -> Self {
        let mut bones = Self::new();
        let root = bones.root(JointSpec::new(0));
        for id in 1..len {
            bones.child(root, JointSpec::new(id as u16));
        }
        bones
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn build(&self) -> Vec<u8> {
        let link = |index: usize| (index * JOINT_RECORD_SIZE) as i32;

        let mut sibling = vec![0i32; self.joints.len()];
        for children in &self.children {
            for pair in children.windows(2) {
                sibling[pair[0]] = link(pair[1]);
            }
        }

        let mut data = Vec::with_capacity(self.joints.len() * JOINT_RECORD_SIZE);
        for (index, spec) in self.joints.iter().enumerate() {
            let child = self.children[index].first().map_or(0, |&first| link(first));

            spec.scale.iter().for_each(|v| data.extend(v.to_le_bytes()));
            data.extend(0i16.to_le_bytes());
            data.extend(spec.id.to_le_bytes());
            spec.rotation.iter().for_each(|v| data.extend(v.to_le_bytes()));
            data.extend(child.to_le_bytes());
            spec.position.iter().for_each(|v| data.extend(v.to_le_bytes()));
            data.extend(sibling[index].to_le_bytes());
            data.extend([0u8; 16]);
        }
        data
    }
}

/// Keyframes for one joint
#[derive(Debug, Clone, Default)]
pub struct JointKeys {
    pub position: Vec<(i32, [f32; 3])>,
    pub rotation: Vec<(i32, [i32; 3])>,
    pub scale: Vec<(i32, [f32; 3])>,
}

impl JointKeys {
    pub fn position(mut self, keys: &[(i32, [f32; 3])]) -> Self {
        self.position = keys.to_vec();
        self
    }

    pub fn rotation(mut self, keys: &[(i32, [i32; 3])]) -> Self {
        self.rotation = keys.to_vec();
        self
    }

    pub fn scale(mut self, keys: &[(i32, [f32; 3])]) -> Self {
        self.scale = keys.to_vec();
        self
    }
}

/// One animation block: header, subheader, entry table, then keyframes
#[derive(Debug, Clone)]
pub struct AnimationBuilder {
    frames: i32,
    layout_marker: u32,
    with_scale: bool,
    declared_joints: Option<i32>,
    joints: Vec<JointKeys>,
}

impl AnimationBuilder {
    pub fn new(frames: i32) -> Self {
        Self {
            frames,
            layout_marker: 0,
            with_scale: false,
            declared_joints: None,
            joints: Vec::new(),
        }
    }

    /// Block with `joints` static entries
    pub fn static_joints(frames: i32, joints: usize) -> Self {
        let mut builder = Self::new(frames);
        builder.joints = vec![JointKeys::default(); joints];
        builder
    }

    pub fn with_scale(mut self) -> Self {
        self.with_scale = true;
        self
    }

    pub fn layout_marker(mut self, marker: u32) -> Self {
        self.layout_marker = marker;
        self
    }

    /// Override the joint count written to the header
    pub fn declared_joints(mut self, count: i32) -> Self {
        self.declared_joints = Some(count);
        self
    }

    pub fn joint(mut self, keys: JointKeys) -> Self {
        self.joints.push(keys);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let stride = if self.with_scale { 0x18 } else { 0x10 };
        let table = ANIMATION_HEADER_SIZE + ANIMATION_SUBHEADER_SIZE;
        let data_start = table + stride * self.joints.len();

        let mut entries = Vec::new();
        let mut payload = Vec::new();
        for keys in &self.joints {
            let position = push_channel(&mut payload, data_start, &encode_floats(&keys.position));
            let rotation = push_channel(&mut payload, data_start, &encode_ints(&keys.rotation));
            let scale = push_channel(&mut payload, data_start, &encode_floats(&keys.scale));

            let words = if self.with_scale {
                vec![position.0, rotation.0, scale.0, position.1, rotation.1, scale.1]
            } else {
                vec![position.0, rotation.0, position.1, rotation.1]
            };
            words.iter().for_each(|w| entries.extend(w.to_le_bytes()));
        }

        let total = (data_start + payload.len()) as i32;
        let joint_count = self
            .declared_joints
            .unwrap_or(self.joints.len() as i32);

        let mut data = Vec::with_capacity(total as usize);
        data.extend(ANIMATION_IDENTIFIER.to_le_bytes());
        data.extend(total.to_le_bytes());
        data.extend(0u32.to_le_bytes());
        data.extend(self.layout_marker.to_le_bytes());
        data.extend(joint_count.to_le_bytes());
        data.extend((ANIMATION_HEADER_SIZE as i32).to_le_bytes());
        data.extend(0u32.to_le_bytes());

        data.extend((table as i32).to_le_bytes());
        data.extend(self.frames.to_le_bytes());
        data.extend(0i32.to_le_bytes());
        data.extend((data_start as i32).to_le_bytes());

        data.extend(entries);
        data.extend(payload);
        data
    }
}

/// Append a channel's records; returns its (offset, count) entry words
fn push_channel(payload: &mut Vec<u8>, data_start: usize, records: &[u8]) -> (i32, i32) {
    let count = (records.len() / KEYFRAME_RECORD_SIZE) as i32;
    if count == 0 {
        return (0, 0);
    }
    let offset = (data_start + payload.len()) as i32;
    payload.extend_from_slice(records);
    (offset, count)
}

fn encode_floats(keys: &[(i32, [f32; 3])]) -> Vec<u8> {
    keys.iter()
        .flat_map(|(frame, value)| {
            let mut record = frame.to_le_bytes().to_vec();
            value.iter().for_each(|v| record.extend(v.to_le_bytes()));
            record
        })
        .collect()
}

fn encode_ints(keys: &[(i32, [i32; 3])]) -> Vec<u8> {
    keys.iter()
        .flat_map(|(frame, value)| {
            let mut record = frame.to_le_bytes().to_vec();
            value.iter().for_each(|v| record.extend(v.to_le_bytes()));
            record
        })
        .collect()
}
