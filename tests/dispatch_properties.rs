mod common;

use common::{Counters, ScriptedProvider, TestKernel, proxy};
use compute_forge::kernel::FeatureLevel;
use compute_forge::provider::{DataProviderHandle, select_sub_invocation_count};
use compute_forge::render_graph::RecordingGraphBuilder;
use compute_forge::scheduler::{ExecutionGroup, GraphScheduler, group_count, merge_thread_counts};
use proptest::prelude::*;

fn slot(counters: &Counters, invocations: Option<usize>) -> Option<DataProviderHandle> {
    invocations.and_then(|n| {
        let mut p = ScriptedProvider::new(16, counters);
        p.invocation_count = n;
        p.boxed()
    })
}

proptest! {
    #[test]
    fn sub_invocation_count_comes_from_the_first_provider_with_work(
        slots in prop::collection::vec(prop::option::of(0usize..5), 0..8)
    ) {
        let counters = Counters::default();
        let providers: Vec<_> = slots.iter().map(|s| slot(&counters, *s)).collect();
        let expected = slots.iter().flatten().copied().find(|&n| n > 0).unwrap_or(1);
        prop_assert_eq!(select_sub_invocation_count(&providers), expected);
    }

    #[test]
    fn group_counts_cover_threads_with_less_than_one_spare_group(
        threads in prop::array::uniform3(0u32..100_000),
        dim in prop::array::uniform3(1u32..1024),
    ) {
        let groups = group_count(threads, dim);
        for axis in 0..3 {
            let covered = u64::from(groups[axis]) * u64::from(dim[axis]);
            prop_assert!(covered >= u64::from(threads[axis]));
            prop_assert!(covered < u64::from(threads[axis]) + u64::from(dim[axis]));
        }
    }

    #[test]
    fn merged_dispatch_covers_exactly_the_summed_threads(
        xs in prop::collection::vec(0u32..10_000, 1..6),
        y in 1u32..8,
        z in 1u32..4,
    ) {
        let counts: Vec<[u32; 3]> = xs.iter().map(|&x| [x, y, z]).collect();
        let merged = merge_thread_counts(&counts);
        prop_assert_eq!(merged, Some([xs.iter().sum::<u32>(), y, z]));
    }

    #[test]
    fn unified_and_split_submissions_cover_the_same_threads(
        xs in prop::collection::vec(1u32..5_000, 2..6),
    ) {
        let counters = Counters::default();
        let counts: Vec<[u32; 3]> = xs.iter().map(|&x| [x, 1, 1]).collect();
        let mut spec = TestKernel::simple("k");
        spec.unified = true;
        spec.group_dim = [1, 1, 1];
        let graph = proxy("g", vec![spec]);

        let mut scheduler = GraphScheduler::default();
        scheduler.enqueue(
            ExecutionGroup::IMMEDIATE,
            "owner",
            graph,
            vec![ScriptedProvider::driver(counts, 16, &counters).boxed()],
            None,
        );
        let mut builder = RecordingGraphBuilder::new();
        scheduler.submit_work(&mut builder, &ExecutionGroup::IMMEDIATE, FeatureLevel::Sm6);

        let passes: Vec<_> = builder.compute_passes().collect();
        prop_assert_eq!(passes.len(), 1);
        prop_assert_eq!(passes[0].group_count[0], xs.iter().sum::<u32>());
    }
}
