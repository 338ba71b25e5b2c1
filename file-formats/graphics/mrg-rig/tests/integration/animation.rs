//! Animation chain merging and frame playback

use std::f64::consts::FRAC_1_SQRT_2;

use glam::{DMat4, DVec3};
use mrg_rig::math;
use mrg_rig::quirks::ALL_POSITIONS_ANIMATED;
use mrg_rig::track::{BLOCK_GAP, MAX_FRAMES};
use mrg_rig::{AssetQuirks, MrgError, Skeleton};
use pretty_assertions::assert_eq;

use crate::common::{AnimationBuilder, BoneBlockBuilder, JointKeys, JointSpec, QUARTER_TURN, init_logging};

fn assert_close(actual: DVec3, expected: DVec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-9),
        "expected {expected:?}, got {actual:?}"
    );
}

/// `actual` is `plain` with each off-diagonal rotation term `[a][b]`
/// scaled by `parent_scale[a] / parent_scale[b]`
fn assert_skew_corrected(actual: &DMat4, plain: &DMat4, parent_scale: DVec3, frame: usize) {
    let ps = parent_scale.to_array();
    for a in 0..3 {
        for b in 0..3 {
            let expected = plain.col(a)[b] * ps[a] / ps[b];
            assert!(
                (actual.col(a)[b] - expected).abs() < 1e-9,
                "frame {frame}: col {a} row {b} expected {expected}, got {}",
                actual.col(a)[b]
            );
        }
    }
    assert_close(actual.w_axis.truncate(), plain.w_axis.truncate());
}

/// root -> arm -> hand, each one unit along Y from its parent
fn arm_bones() -> BoneBlockBuilder {
    let mut bones = BoneBlockBuilder::new();
    let root = bones.root(JointSpec::new(0));
    let arm = bones.child(root, JointSpec::new(1).position([0.0, 1.0, 0.0]));
    bones.child(arm, JointSpec::new(2).position([0.0, 1.0, 0.0]));
    bones
}

fn chain(blocks: &[AnimationBuilder]) -> Vec<u8> {
    let mut data: Vec<u8> = blocks.iter().flat_map(AnimationBuilder::build).collect();
    data.extend([0u8; 0x1C]);
    data
}

fn load(blocks: &[AnimationBuilder], quirks: &AssetQuirks) -> Skeleton {
    init_logging();
    let mut skeleton = Skeleton::from_buffer(&arm_bones().build(), 0).unwrap();
    skeleton.load_animations(&chain(blocks), 0, quirks).unwrap();
    skeleton
}

#[test]
fn test_blocks_are_separated_by_gap() {
    let skeleton = load(
        &[
            AnimationBuilder::static_joints(4, 3),
            AnimationBuilder::static_joints(3, 3),
            AnimationBuilder::static_joints(2, 3),
        ],
        &AssetQuirks::default(),
    );

    let frames = skeleton.frames();
    assert_eq!(frames, &[0, 1, 2, 3, 63, 64, 65, 125, 126]);
    assert!(frames.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(frames[4] - frames[3], BLOCK_GAP);

    for joint in skeleton.joints() {
        assert_eq!(joint.track().frames(), frames);
        assert_eq!(joint.track().transforms().len(), frames.len());
        assert_eq!(joint.track().scales().len(), frames.len());
    }
}

#[test]
fn test_static_joint_matrix_is_bind_local() {
    let skeleton = load(
        &[AnimationBuilder::new(5)
            .joint(JointKeys::default())
            .joint(JointKeys::default().rotation(&[(0, [0, 0, 0]), (4, [0, 0, QUARTER_TURN])]))
            .joint(JointKeys::default())],
        &AssetQuirks::default(),
    );

    let hand = skeleton.find(2).unwrap();
    for transform in hand.track().transforms() {
        assert_eq!(transform, hand.local_transform());
    }
}

#[test]
fn test_quarter_turn_halfway() {
    let mut skeleton = load(
        &[AnimationBuilder::new(11)
            .joint(JointKeys::default().rotation(&[(0, [0, 0, 0]), (10, [0, 0, QUARTER_TURN])]))
            .joint(JointKeys::default())
            .joint(JointKeys::default())],
        &AssetQuirks::default(),
    );

    skeleton.set_frame(5);
    let root = skeleton.root();
    assert_eq!(root.posed_frame(), Some(5));
    assert_close(
        root.world_transform().x_axis.truncate(),
        DVec3::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0),
    );

    // The hand two units up the Y axis swings with the root
    let hand = skeleton.find(2).unwrap();
    assert_close(
        hand.transform_vertex(DVec3::ZERO),
        DVec3::new(-2.0 * FRAC_1_SQRT_2, 2.0 * FRAC_1_SQRT_2, 0.0),
    );

    skeleton.set_frame(10);
    assert_close(skeleton.root().world_transform().x_axis.truncate(), DVec3::Y);
}

#[test]
fn test_shortest_path_rotation() {
    let three_quarter_turn = AnimationBuilder::new(11)
        .joint(JointKeys::default().rotation(&[(0, [0, 0, 0]), (10, [0, 0, 3 * QUARTER_TURN])]))
        .joint(JointKeys::default())
        .joint(JointKeys::default());

    let mut long_way = load(&[three_quarter_turn.clone()], &AssetQuirks::default());
    long_way.set_frame(5);
    assert_close(
        long_way.root().world_transform().x_axis.truncate(),
        DVec3::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0),
    );

    let quirks = AssetQuirks {
        shortest_path_rotation: true,
        ..AssetQuirks::default()
    };
    let mut short_way = load(&[three_quarter_turn], &quirks);
    short_way.set_frame(5);
    assert_close(
        short_way.root().world_transform().x_axis.truncate(),
        DVec3::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0),
    );
}

#[test]
fn test_scale_channel_is_inherited() {
    let skeleton = load(
        &[AnimationBuilder::new(3)
            .with_scale()
            .joint(JointKeys::default().scale(&[(0, [9.0, 9.0, 9.0])]))
            .joint(JointKeys::default().scale(&[(0, [1.0, 1.0, 1.0]), (2, [3.0, 1.0, 1.0])]))
            .joint(JointKeys::default())],
        &AssetQuirks::default(),
    );

    // The root never takes a scale channel
    let root = skeleton.root();
    assert!(root.track().scales().iter().all(|scale| *scale == DVec3::ONE));

    let hand = skeleton.find(2).unwrap();
    assert_eq!(
        hand.track().scales(),
        &[DVec3::ONE, DVec3::new(2.0, 1.0, 1.0), DVec3::new(3.0, 1.0, 1.0)]
    );
}

#[test]
fn test_animated_position_is_divided_by_parent_scale() {
    let skeleton = load(
        &[AnimationBuilder::new(1)
            .with_scale()
            .joint(JointKeys::default())
            .joint(JointKeys::default().scale(&[(0, [2.0, 2.0, 2.0])]))
            .joint(JointKeys::default().position(&[(0, [0.0, 4.0, 0.0])]))],
        &AssetQuirks::default(),
    );

    let hand = skeleton.find(2).unwrap();
    assert_close(hand.track().transforms()[0].w_axis.truncate(), DVec3::new(0.0, 2.0, 0.0));
}

#[test]
fn test_scaling_fix_follows_layout_marker() {
    let block = |marker| {
        AnimationBuilder::new(2)
            .layout_marker(marker)
            .joint(JointKeys::default())
            .joint(JointKeys::default())
            .joint(JointKeys::default().position(&[(0, [0.0, 10.0, 0.0]), (1, [0.0, 20.0, 0.0])]))
    };

    let fixed = load(&[block(ALL_POSITIONS_ANIMATED)], &AssetQuirks::default());
    let heights: Vec<f64> = fixed.find(2).unwrap().track().transforms().iter().map(|m| m.w_axis.y).collect();
    assert_eq!(heights, vec![1.0, 2.0]);

    let raw = load(&[block(0)], &AssetQuirks::default());
    let heights: Vec<f64> = raw.find(2).unwrap().track().transforms().iter().map(|m| m.w_axis.y).collect();
    assert_eq!(heights, vec![10.0, 20.0]);
}

#[test]
fn test_frames_between_blocks_hold() {
    let mut skeleton = load(
        &[
            AnimationBuilder::new(2)
                .joint(JointKeys::default().position(&[(0, [5.0, 0.0, 0.0])]))
                .joint(JointKeys::default())
                .joint(JointKeys::default()),
            AnimationBuilder::new(2)
                .joint(JointKeys::default().position(&[(0, [7.0, 0.0, 0.0])]))
                .joint(JointKeys::default())
                .joint(JointKeys::default()),
        ],
        &AssetQuirks::default(),
    );

    skeleton.set_frame(30);
    assert_close(skeleton.root().world_transform().w_axis.truncate(), DVec3::new(5.0, 0.0, 0.0));

    skeleton.set_frame(61);
    assert_close(skeleton.root().world_transform().w_axis.truncate(), DVec3::new(7.0, 0.0, 0.0));

    skeleton.set_frame(500);
    assert_eq!(skeleton.root().posed_frame(), Some(500));
    assert_close(skeleton.root().world_transform().w_axis.truncate(), DVec3::new(7.0, 0.0, 0.0));
}

#[test]
fn test_single_key_stream_holds() {
    let skeleton = load(
        &[AnimationBuilder::new(4)
            .joint(JointKeys::default().position(&[(2, [0.0, 0.0, 3.0])]))
            .joint(JointKeys::default())
            .joint(JointKeys::default())],
        &AssetQuirks::default(),
    );

    for transform in skeleton.root().track().transforms() {
        assert_close(transform.w_axis.truncate(), DVec3::new(0.0, 0.0, 3.0));
    }
}

#[test]
fn test_truncated_keyframes_leave_tracks_untouched() {
    let mut data = AnimationBuilder::new(3)
        .joint(JointKeys::default())
        .joint(JointKeys::default())
        .joint(JointKeys::default().position(&[(0, [1.0, 0.0, 0.0]), (2, [2.0, 0.0, 0.0])]))
        .build();
    data.truncate(data.len() - 8);

    let mut skeleton = Skeleton::from_buffer(&arm_bones().build(), 0).unwrap();
    assert!(skeleton.load_animations(&data, 0, &AssetQuirks::default()).is_err());
    assert!(skeleton.joints().iter().all(|joint| joint.track().is_empty()));
}

#[test]
fn test_children_follow_animated_non_uniform_parent_scale() {
    // root -> arm -> [hand (static), thumb (keyed)]
    let mut bones = BoneBlockBuilder::new();
    let root = bones.root(JointSpec::new(0));
    let arm = bones.child(root, JointSpec::new(1).position([0.0, 1.0, 0.0]));
    bones.child(
        arm,
        JointSpec::new(2)
            .position([0.0, 1.0, 0.0])
            .rotation([QUARTER_TURN / 2, QUARTER_TURN / 3, QUARTER_TURN / 4]),
    );
    bones.child(arm, JointSpec::new(3).position([1.0, 0.0, 0.0]));

    let thumb_rotations = [
        [0, 0, QUARTER_TURN / 2],
        [QUARTER_TURN / 4, 0, QUARTER_TURN / 2],
        [0, QUARTER_TURN / 3, QUARTER_TURN],
    ];
    let thumb_position = DVec3::new(0.5, 1.0, 0.0);
    let block = AnimationBuilder::new(3)
        .with_scale()
        .joint(JointKeys::default())
        .joint(JointKeys::default().scale(&[(0, [1.0, 1.0, 1.0]), (2, [2.0, 1.0, 1.0])]))
        .joint(JointKeys::default())
        .joint(
            JointKeys::default()
                .position(&[(0, [0.5, 1.0, 0.0])])
                .rotation(&[
                    (0, thumb_rotations[0]),
                    (1, thumb_rotations[1]),
                    (2, thumb_rotations[2]),
                ]),
        );

    init_logging();
    let mut skeleton = Skeleton::from_buffer(&bones.build(), 0).unwrap();
    skeleton
        .load_animations(&chain(&[block]), 0, &AssetQuirks::default())
        .unwrap();

    let parent_scales = skeleton.find(1).unwrap().track().scales().to_vec();
    assert_eq!(
        parent_scales,
        vec![DVec3::ONE, DVec3::new(1.5, 1.0, 1.0), DVec3::new(2.0, 1.0, 1.0)]
    );

    let hand = skeleton.find(2).unwrap();
    let bind = hand.bind_pose();
    let plain = math::transform_skewed(bind.position, bind.rotation, bind.scale);
    for (frame, (actual, ps)) in hand.track().transforms().iter().zip(&parent_scales).enumerate() {
        assert_skew_corrected(actual, &plain, *ps, frame);
        assert_eq!(hand.track().scales()[frame], *ps * bind.scale);
    }
    assert!(!hand.track().transforms()[2].abs_diff_eq(plain, 1e-3));

    let thumb = skeleton.find(3).unwrap();
    for (frame, (actual, ps)) in thumb.track().transforms().iter().zip(&parent_scales).enumerate() {
        let rotation = math::rotation_from_turns(thumb_rotations[frame]);
        let plain = math::transform_skewed(thumb_position / *ps, rotation, DVec3::ONE);
        assert_skew_corrected(actual, &plain, *ps, frame);
    }
}

#[test]
fn test_oversized_frame_count_is_rejected() {
    init_logging();
    for frames in [MAX_FRAMES as i32 + 1, i32::MAX] {
        let data = chain(&[AnimationBuilder::static_joints(frames, 3)]);
        let mut skeleton = Skeleton::from_buffer(&arm_bones().build(), 0).unwrap();
        assert!(matches!(
            skeleton.load_animations(&data, 0, &AssetQuirks::default()),
            Err(MrgError::ParseError(_))
        ));
        assert!(skeleton.joints().iter().all(|joint| joint.track().is_empty()));
    }
}
