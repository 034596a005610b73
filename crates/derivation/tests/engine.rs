use kleio_core::{KleioError, KleioResult, SparqlClient};
use kleio_derivation::vocab::epoch_seconds;
use kleio_derivation::DerivationClient;
use kleio_testkit::{MemorySparqlClient, StubAgent};
use oxrdf::NamedNode;

fn iri(value: &str) -> NamedNode {
    NamedNode::new(value).expect("valid iri")
}

#[tokio::test]
async fn update_rejects_a_circular_dependency() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node_a = iri("http://a");
    let node_b = iri("http://b");

    engine
        .metadata()
        .init_derived(
            &node_a,
            &iri("http://agent-a"),
            "http://agent.example/a",
            std::slice::from_ref(&node_b),
            Some(100),
        )
        .await?;
    engine
        .metadata()
        .init_derived(
            &node_b,
            &iri("http://agent-b"),
            "http://agent.example/b",
            std::slice::from_ref(&node_a),
            Some(100),
        )
        .await?;

    let result = engine.update(&node_a).await;
    assert!(matches!(result, Err(KleioError::CircularDependency { .. })));
    assert_eq!(agent.call_count(), 0);
    assert!(!engine.validate(&node_a).await);
    Ok(())
}

#[tokio::test]
async fn stale_node_is_refreshed_and_then_left_alone() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://x");
    let input = iri("http://y");
    let old_output = iri("http://x-old");
    let new_output = iri("http://x-new");

    engine.metadata().add_time_instance(&input, Some(200)).await?;
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-x"),
            "http://agent.example/x",
            std::slice::from_ref(&input),
            Some(100),
        )
        .await?;
    engine
        .metadata()
        .attach_outputs(std::slice::from_ref(&old_output), &node)
        .await?;

    agent.push_response(vec![new_output.clone()]);
    let before = epoch_seconds();
    engine.update(&node).await?;

    // The agent ran once with the node's inputs.
    assert_eq!(agent.call_count(), 1);
    assert_eq!(agent.last_inputs(), vec![input.clone()]);

    // Old outputs were replaced by the agent's new entity.
    assert_eq!(
        engine.metadata().derived_entities(&node).await?,
        vec![new_output]
    );

    // The timestamp moved to the current wall clock, ahead of the input.
    let refreshed = engine.metadata().timestamp(&node).await?;
    assert!(refreshed >= before);
    assert!(refreshed >= engine.metadata().timestamp(&input).await?);

    // A second update finds the node current and calls no agent.
    engine.update(&node).await?;
    assert_eq!(agent.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn up_to_date_node_never_calls_the_agent() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://x");
    let input = iri("http://y");

    engine.metadata().add_time_instance(&input, Some(100)).await?;
    // Equal timestamps are not out of date.
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-x"),
            "http://agent.example/x",
            std::slice::from_ref(&input),
            Some(100),
        )
        .await?;

    engine.update(&node).await?;
    assert_eq!(agent.call_count(), 0);
    assert_eq!(engine.metadata().timestamp(&node).await?, 100);
    Ok(())
}

#[tokio::test]
async fn chain_refreshes_predecessors_first() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let raw = iri("http://raw");
    let upstream = iri("http://upstream");
    let bridge = iri("http://bridge");
    let node = iri("http://node");

    engine.metadata().add_time_instance(&raw, Some(300)).await?;
    // The upstream node appends to an existing series, so its outputs stay
    // in place across refreshes.
    engine
        .metadata()
        .init_derived_with_time_series(
            &upstream,
            &iri("http://agent-up"),
            "http://agent.example/up",
            std::slice::from_ref(&raw),
            Some(100),
        )
        .await?;
    engine
        .metadata()
        .attach_outputs(std::slice::from_ref(&bridge), &upstream)
        .await?;
    engine.metadata().add_time_instance(&bridge, Some(250)).await?;
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-node"),
            "http://agent.example/node",
            std::slice::from_ref(&bridge),
            Some(100),
        )
        .await?;

    agent.push_response(vec![]);
    agent.push_response(vec![]);
    engine.update(&node).await?;

    // Both the upstream node and the node itself were refreshed, the
    // upstream one first.
    assert_eq!(agent.call_count(), 2);
    assert!(engine.metadata().timestamp(&upstream).await? >= 300);
    assert_eq!(
        engine.metadata().derived_entities(&upstream).await?,
        vec![bridge.clone()]
    );
    assert!(engine.metadata().timestamp(&node).await? >= 250);
    Ok(())
}

#[tokio::test]
async fn replaced_outputs_are_reconnected_by_type() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://x");
    let input = iri("http://y");
    let old_output = iri("http://out-old");
    let new_output = iri("http://out-new");
    let downstream = iri("http://downstream");

    engine.metadata().add_time_instance(&input, Some(200)).await?;
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-x"),
            "http://agent.example/x",
            std::slice::from_ref(&input),
            Some(100),
        )
        .await?;
    engine
        .metadata()
        .attach_outputs(std::slice::from_ref(&old_output), &node)
        .await?;
    kb.update(&format!(
        "INSERT DATA {{ {old_output} a <http://types/T1> . {new_output} a <http://types/T1> . }}"
    ))
    .await?;
    engine
        .metadata()
        .init_derived(
            &downstream,
            &iri("http://agent-d"),
            "http://agent.example/d",
            std::slice::from_ref(&old_output),
            Some(100),
        )
        .await?;

    agent.push_response(vec![new_output.clone()]);
    engine.update(&node).await?;

    // The downstream node now consumes the replacement entity.
    assert_eq!(
        engine.metadata().inputs(&downstream).await?,
        vec![new_output.clone()]
    );
    assert_eq!(
        engine.metadata().derived_entities(&node).await?,
        vec![new_output]
    );
    Ok(())
}

#[tokio::test]
async fn ambiguous_or_missing_types_fail_reconnection() -> KleioResult<()> {
    for (new_types, expect_missing) in [
        (vec![("http://n1", "http://types/T1"), ("http://n2", "http://types/T1")], false),
        (vec![("http://n1", "http://types/T2")], true),
    ] {
        let kb = MemorySparqlClient::new();
        let agent = StubAgent::new();
        let engine = DerivationClient::new(&kb, &agent);
        let node = iri("http://x");
        let input = iri("http://y");
        let old_output = iri("http://out-old");
        let downstream = iri("http://downstream");

        engine.metadata().add_time_instance(&input, Some(200)).await?;
        engine
            .metadata()
            .init_derived(
                &node,
                &iri("http://agent-x"),
                "http://agent.example/x",
                std::slice::from_ref(&input),
                Some(100),
            )
            .await?;
        engine
            .metadata()
            .attach_outputs(std::slice::from_ref(&old_output), &node)
            .await?;
        kb.update(&format!(
            "INSERT DATA {{ {old_output} a <http://types/T1> . }}"
        ))
        .await?;
        engine
            .metadata()
            .init_derived(
                &downstream,
                &iri("http://agent-d"),
                "http://agent.example/d",
                std::slice::from_ref(&old_output),
                Some(100),
            )
            .await?;

        let mut outputs = Vec::new();
        for (entity, entity_type) in &new_types {
            let entity = iri(entity);
            kb.update(&format!("INSERT DATA {{ {entity} a <{entity_type}> . }}"))
                .await?;
            outputs.push(entity);
        }
        agent.push_response(outputs);

        let result = engine.update(&node).await;
        assert!(
            matches!(result, Err(KleioError::Reconnection { .. })),
            "expected reconnection failure (missing = {expect_missing})"
        );
    }
    Ok(())
}

#[tokio::test]
async fn time_series_derived_nodes_keep_their_outputs() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://z");
    let input = iri("http://y");
    let output = iri("http://z-series");

    engine.metadata().add_time_instance(&input, Some(200)).await?;
    engine
        .metadata()
        .init_derived_with_time_series(
            &node,
            &iri("http://agent-z"),
            "http://agent.example/z",
            std::slice::from_ref(&input),
            Some(100),
        )
        .await?;
    engine
        .metadata()
        .attach_outputs(std::slice::from_ref(&output), &node)
        .await?;

    agent.push_response(vec![iri("http://ignored")]);
    engine.update(&node).await?;

    // The agent ran, the outputs stayed, only the timestamp moved.
    assert_eq!(agent.call_count(), 1);
    assert_eq!(
        engine.metadata().derived_entities(&node).await?,
        vec![output]
    );
    assert!(engine.metadata().timestamp(&node).await? >= 200);
    Ok(())
}

#[tokio::test]
async fn agent_failure_aborts_without_touching_the_timestamp() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://x");
    let input = iri("http://y");

    engine.metadata().add_time_instance(&input, Some(200)).await?;
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-x"),
            "http://agent.example/x",
            std::slice::from_ref(&input),
            Some(100),
        )
        .await?;

    agent.set_failing(true);
    let result = engine.update(&node).await;
    assert!(matches!(result, Err(KleioError::Agent { .. })));
    assert_eq!(engine.metadata().timestamp(&node).await?, 100);
    Ok(())
}

#[tokio::test]
async fn validate_checks_timestamps_without_mutating() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let agent = StubAgent::new();
    let engine = DerivationClient::new(&kb, &agent);
    let node = iri("http://x");
    let with_time = iri("http://y");
    let without_time = iri("http://z");

    engine.metadata().add_time_instance(&with_time, Some(1)).await?;
    engine
        .metadata()
        .init_derived(
            &node,
            &iri("http://agent-x"),
            "http://agent.example/x",
            &[with_time.clone(), without_time.clone()],
            Some(100),
        )
        .await?;

    // One input has no timestamp yet.
    assert!(!engine.validate(&node).await);

    engine.metadata().add_time_instance(&without_time, Some(2)).await?;
    assert!(engine.validate(&node).await);

    // Validation never calls agents and never advances timestamps.
    assert_eq!(agent.call_count(), 0);
    assert_eq!(engine.metadata().timestamp(&node).await?, 100);
    Ok(())
}
