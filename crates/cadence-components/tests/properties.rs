//! Property tests for the sample helpers and the built-in drivers.

use std::sync::Arc;

use cadence_components::{builtin_registry, pcm};
use cadence_core::{
    BufferDescriptor, BufferId, ComponentDescriptor, ComponentId, Direction, Engine, EngineConfig,
    HostNotifier, ManualScheduler, PipelineDescriptor, PipelineId, Platform, RecordingNotifier,
    SampleFormat, StreamParams, TriggerCmd,
};
use proptest::prelude::*;

fn s16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Runs host -> `kind` -> dai for `periods` periods and returns the number
/// of XRUN notifications.
fn run_chain(node: ComponentDescriptor, rate: u32, periods: u64) -> usize {
    let sched = Arc::new(ManualScheduler::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let platform = Platform::simulated(sched.clone())
        .with_notifier(notifier.clone() as Arc<dyn HostNotifier>);
    let engine = Engine::new(EngineConfig::default(), Arc::new(builtin_registry()), platform);

    engine.comp_new(&ComponentDescriptor::new(1, "host", 1)).unwrap();
    engine.comp_new(&node).unwrap();
    engine.comp_new(&ComponentDescriptor::new(3, "dai", 1)).unwrap();
    for (buf, from, to) in [(10, 1, 2), (11, 2, 3)] {
        engine.buffer_new(&BufferDescriptor::new(buf, 1, 768)).unwrap();
        engine.connect(ComponentId(from), BufferId(buf), Direction::Downstream).unwrap();
        engine.connect(ComponentId(to), BufferId(buf), Direction::Upstream).unwrap();
    }
    engine.pipeline_new(PipelineDescriptor::new(1, 3)).unwrap();
    engine.complete(PipelineId(1), ComponentId(1), ComponentId(3)).unwrap();

    let params = StreamParams {
        rate,
        ..StreamParams::default()
    };
    engine.params(PipelineId(1), ComponentId(1), params).unwrap();
    engine.prepare(PipelineId(1), ComponentId(1)).unwrap();
    engine.trigger(PipelineId(1), ComponentId(1), TriggerCmd::Start).unwrap();
    sched.advance(periods * 1000, |task| engine.run_task(task));
    notifier.xrun_count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Unity gain leaves every sample untouched.
    #[test]
    fn unity_gain_is_identity(values in prop::collection::vec(any::<i16>(), 0..64)) {
        let mut data = s16(&values);
        pcm::scale(SampleFormat::S16Le, &mut data, 100);
        prop_assert_eq!(data, s16(&values));
    }

    /// Scaling never wraps: the result is the clamped exact product.
    #[test]
    fn scale_saturates_instead_of_wrapping(v in any::<i16>(), gain in 0i64..400) {
        let mut data = s16(&[v]);
        pcm::scale(SampleFormat::S16Le, &mut data, gain);
        let expected = (i64::from(v) * gain / 100).clamp(i64::from(i16::MIN), i64::from(i16::MAX));
        prop_assert_eq!(data, s16(&[expected as i16]));
    }

    /// Any gain, however large or negative, gives the clamped exact product.
    #[test]
    fn scale_handles_every_gain(v in any::<i16>(), w in any::<i32>(), gain in any::<i64>()) {
        let exact = |v: i64, min: i64, max: i64| {
            (i128::from(v) * i128::from(gain) / 100).clamp(i128::from(min), i128::from(max))
        };

        let mut data = s16(&[v]);
        pcm::scale(SampleFormat::S16Le, &mut data, gain);
        let expected = exact(i64::from(v), i64::from(i16::MIN), i64::from(i16::MAX));
        prop_assert_eq!(data, s16(&[expected as i16]));

        let mut data = w.to_le_bytes().to_vec();
        pcm::scale(SampleFormat::S32Le, &mut data, gain);
        let expected = exact(i64::from(w), i64::from(i32::MIN), i64::from(i32::MAX));
        prop_assert_eq!(data, (expected as i32).to_le_bytes().to_vec());
    }

    /// Mixing in silence leaves the destination untouched.
    #[test]
    fn mixing_silence_is_identity(values in prop::collection::vec(any::<i32>(), 0..32)) {
        let mut dst: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let before = dst.clone();
        let silence = vec![0u8; dst.len()];
        pcm::mix_into(SampleFormat::S32Le, &mut dst, &silence);
        prop_assert_eq!(dst, before);
    }

    /// A volume node of any gain keeps a playback chain fed.
    #[test]
    fn volume_chain_never_underruns(gain in 0i64..=400, periods in 1u64..20) {
        let node = ComponentDescriptor::new(2, "volume", 1).with_option("gain", gain);
        prop_assert_eq!(run_chain(node, 48_000, periods), 0);
    }

    /// Upsampling produces at least a period per period, so the port is
    /// never starved.
    #[test]
    fn upsampling_chain_never_underruns(
        in_rate in 8_000u32..=96_000,
        extra in 0u32..=96_000,
        periods in 1u64..20,
    ) {
        let node = ComponentDescriptor::new(2, "src", 1).with_option("rate", i64::from(in_rate + extra));
        prop_assert_eq!(run_chain(node, in_rate, periods), 0);
    }
}
