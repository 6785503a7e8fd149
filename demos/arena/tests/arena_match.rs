//! A full arena match between two reference clients.

use std::time::Duration;

use arena::{ArenaEngine, SPAWN_AMOUNT};
use rgmatch::prelude::*;

#[tokio::test]
async fn test_two_guard_clients_play_to_the_end() {
    let server = MatchServerBuilder::new()
        .bind("127.0.0.1", 0)
        .max_turns(12)
        .build(ArenaEngine::new(42), JsonCodec)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry().clone();
    tokio::spawn(server.run());

    let server_uri: MatchUri = format!("rg-match://{addr}").parse().unwrap();
    let creator = tokio::spawn({
        let uri = server_uri.clone();
        async move {
            MatchClient::new("alpha", GuardBrain, JsonCodec)
                .start_retry(Duration::from_millis(300))
                .play(&uri)
                .await
        }
    });

    let id = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(info) = registry.list().await.first() {
                return info.id.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let mut join_uri = server_uri;
    join_uri.match_id = Some(id);
    let joiner = MatchClient::new("beta", GuardBrain, JsonCodec)
        .start_retry(Duration::from_millis(10))
        .play(&join_uri)
        .await
        .unwrap();
    let creator = creator.await.unwrap().unwrap();

    for report in [&creator, &joiner] {
        assert_eq!(report.settings.game.board_size, 19);
        assert_eq!(report.history.len(), 13);

        let first = &report.history[&1];
        assert_eq!(first.owned_by(0).count(), SPAWN_AMOUNT as usize);
        assert_eq!(first.owned_by(1).count(), SPAWN_AMOUNT as usize);

        // Nobody moves, so the turn-11 wave replaces every robot on the board.
        let last = report.final_snapshot().unwrap();
        assert_eq!(last.turn, 13);
        assert_eq!(last.robots.len(), 2 * SPAWN_AMOUNT as usize);
        assert!(last.robots.iter().all(|r| r.robot_id > 2 * SPAWN_AMOUNT));
    }
    assert_eq!(creator.history, joiner.history);
}
