use super::helpers::*;
use crate::*;
use anyhow::Result;
use mesh::MeshListener;
use record::Record;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::tempdir;

/// Runs every node of a loopback cluster on its own thread.
///
/// `shards[i]` is node i's input; returns each node's sorted output and summary.
fn run_cluster(dir: &Path, shards: &[Vec<Record>]) -> Result<Vec<(Vec<Record>, RunSummary)>> {
    let (topology, listeners) = local_topology(shards.len())?;
    let mut handles = Vec::new();

    for (id, (shard, listener)) in shards.iter().zip(listeners).enumerate() {
        let input = dir.join(format!("input-{}.dat", id));
        let output = dir.join(format!("output-{}.dat", id));
        write_shard(&input, shard)?;

        let opts = NodeOptions {
            self_id: id,
            input,
            output: output.clone(),
            topology: topology.clone(),
            config: quick_config(),
        };
        handles.push(thread::spawn(move || -> Result<(PathBuf, RunSummary)> {
            let summary = run_node_with_listener(&opts, MeshListener::from_listener(listener))?;
            Ok((output, summary))
        }));
    }

    let mut results = Vec::new();
    for h in handles {
        let (output, summary) = h.join().expect("node thread panicked")?;
        results.push((read_output(&output)?, summary));
    }
    Ok(results)
}

fn assert_sorted(records: &[Record]) {
    for pair in records.windows(2) {
        assert!(pair[0].key() <= pair[1].key(), "{:?} > {:?}", pair[0], pair[1]);
    }
}

fn sorted_bytes(records: impl IntoIterator<Item = Record>) -> Vec<[u8; record::RECORD_SIZE]> {
    let mut v: Vec<_> = records.into_iter().map(|r| *r.as_bytes()).collect();
    v.sort();
    v
}

#[test]
fn two_nodes_split_on_top_bit() -> Result<()> {
    let dir = tempdir()?;
    let low = make_record(0x00, 0x00);
    let high = make_record(0xff, 0xff);

    let results = run_cluster(dir.path(), &[vec![low.clone(), high.clone()], vec![]])?;

    assert_eq!(results[0].0, vec![low]);
    assert_eq!(results[1].0, vec![high]);

    assert_eq!(results[0].1.sent, 2);
    assert_eq!(results[0].1.per_destination, vec![1, 1]);
    assert_eq!(results[0].1.received, 1);
    assert_eq!(results[1].1.sent, 0);
    assert_eq!(results[1].1.received, 1);
    Ok(())
}

#[test]
fn single_node_sorts_through_self_link() -> Result<()> {
    let dir = tempdir()?;
    let input = pseudo_random_records(200, 3);

    let results = run_cluster(dir.path(), &[input.clone()])?;
    let (out, summary) = &results[0];

    assert_eq!(summary.sent, 200);
    assert_eq!(summary.received, 200);
    assert_sorted(out);
    assert_eq!(sorted_bytes(out.clone()), sorted_bytes(input));
    Ok(())
}

#[test]
fn four_nodes_conserve_partition_and_sort() -> Result<()> {
    let dir = tempdir()?;
    let shards: Vec<Vec<Record>> = (0..4)
        .map(|i| pseudo_random_records(300 + i * 50, 11 + i as u64))
        .collect();

    let results = run_cluster(dir.path(), &shards)?;

    let mut all_out = Vec::new();
    for (node, (out, summary)) in results.iter().enumerate() {
        assert_sorted(out);
        assert_eq!(summary.received as usize, out.len());
        for r in out {
            assert_eq!(destination(r.key(), 2), node, "{:?} on wrong node", r);
        }
        all_out.extend(out.iter().cloned());
    }

    let sent: u64 = results.iter().map(|(_, s)| s.sent).sum();
    assert_eq!(sent as usize, all_out.len());
    assert_eq!(
        sorted_bytes(all_out),
        sorted_bytes(shards.into_iter().flatten())
    );
    Ok(())
}

#[test]
fn empty_cluster_inputs_produce_empty_outputs() -> Result<()> {
    let dir = tempdir()?;
    let results = run_cluster(dir.path(), &[vec![], vec![]])?;
    for (out, summary) in results {
        assert!(out.is_empty());
        assert_eq!(summary.bytes_written, 0);
    }
    Ok(())
}

#[test]
fn missing_input_fails_before_networking() -> Result<()> {
    let dir = tempdir()?;
    let (topology, mut listeners) = local_topology(1)?;
    let opts = NodeOptions {
        self_id: 0,
        input: dir.path().join("absent.dat"),
        output: dir.path().join("out.dat"),
        topology,
        config: quick_config(),
    };

    let err = run_node_with_listener(&opts, MeshListener::from_listener(listeners.remove(0)))
        .unwrap_err();
    assert!(format!("{:#}", err).contains("absent.dat"));
    Ok(())
}

#[test]
fn unknown_self_id_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let (topology, _listeners) = local_topology(2)?;
    let opts = NodeOptions {
        self_id: 7,
        input: dir.path().join("in.dat"),
        output: dir.path().join("out.dat"),
        topology,
        config: quick_config(),
    };
    assert!(run_node(&opts).is_err());
    Ok(())
}
