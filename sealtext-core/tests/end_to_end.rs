/*
    End-to-End Integration Tests

    Multiple participants exchanging messages through one in-memory remote:
    - Interleaved sends ordered by timestamp on read
    - Wrong-key readers and tampered partitions
    - Concurrent publishers racing for the same branch
    - Unreachable and slow remotes
*/

use sealtext_core::core_crypto::CryptoError;
use sealtext_core::core_message::chain::HashChainer;
use sealtext_core::core_message::types::{
    IntegrityStatus, MessageDraft, PlaintextMessage, TAMPER_WARNING, UNDECRYPTABLE_NOTICE,
};
use sealtext_core::core_store::{AuthorId, MemoryRemote};
use sealtext_core::session::SessionError;
use sealtext_core::test_utils::*;
use std::time::Duration;

fn remote_partition(remote: &MemoryRemote, author: &str) -> Vec<String> {
    let path = AuthorId::from_display_name(author).partition_path();
    let bytes = remote.read_file(TEST_BRANCH, &path).expect("partition exists on remote");
    serde_json::from_slice(&bytes).unwrap()
}

fn write_remote_partition(remote: &MemoryRemote, author: &str, tokens: &[String]) {
    let path = AuthorId::from_display_name(author).partition_path();
    remote.write_file_direct(TEST_BRANCH, path, serde_json::to_vec_pretty(tokens).unwrap());
}

/// **Scenario: one author, one reader**
///
/// Alice sends "hi"; Bob, sharing the mnemonic, fetches and sees it verified.
#[tokio::test]
async fn test_message_reaches_other_participant() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);
    let mut bob = test_participant(&remote);

    alice.send_message("hi", "alice").await.unwrap();

    let messages = bob.fetch_messages().await.unwrap();
    assert_eq!(transcript(&messages), vec![("alice".to_string(), "hi".to_string())]);
    assert_all_verified(&messages);

    let log = remote.log(TEST_BRANCH);
    assert_eq!(log[0].message, "Message from alice");
}

/// **Scenario: interleaved timestamps**
///
/// Alice and Bob each append two messages; the read result is ordered by
/// timestamp regardless of which partition holds which record.
#[tokio::test]
async fn test_two_authors_interleaved_by_timestamp() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);
    let mut bob = test_participant(&remote);

    alice.send_draft(MessageDraft::new("a1", "alice", fixed_timestamp(1))).await.unwrap();
    bob.send_draft(MessageDraft::new("b2", "bob", fixed_timestamp(2))).await.unwrap();
    bob.send_draft(MessageDraft::new("b4", "bob", fixed_timestamp(4))).await.unwrap();
    alice.send_draft(MessageDraft::new("a3", "alice", fixed_timestamp(3))).await.unwrap();

    for reader in [&mut alice, &mut bob] {
        let messages = reader.fetch_messages().await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "b2", "a3", "b4"]);
        assert_chronological(&messages);
        assert_all_verified(&messages);
    }
}

/// **Scenario: wrong mnemonic**
///
/// A token opened with another valid mnemonic fails authentication, and a
/// reader holding the wrong key sees placeholders rather than an error.
#[tokio::test]
async fn test_wrong_mnemonic_cannot_read() {
    let record = HashChainer::seal(MessageDraft::new("hi", "alice", "2025-01-01T00:00:00"), None);
    let token = test_cipher(TEST_MNEMONIC).seal(&record).unwrap();

    let opened: PlaintextMessage = test_cipher(TEST_MNEMONIC).open(&token).unwrap();
    assert_eq!(opened, record);
    assert_eq!(opened.prev_hash, None);
    assert_eq!(test_cipher(OTHER_MNEMONIC).open(&token), Err(CryptoError::DecryptionFailed));

    let remote = test_remote();
    let mut alice = test_participant(&remote);
    let mut eve = TestParticipantBuilder::new(&remote).with_mnemonic(OTHER_MNEMONIC).build();

    alice.send_message("one", "alice").await.unwrap();
    alice.send_message("two", "alice").await.unwrap();

    let messages = eve.fetch_messages().await.unwrap();
    assert_integrity(&messages, &[IntegrityStatus::Undecryptable; 2]);
    assert!(messages.iter().all(|m| m.content == UNDECRYPTABLE_NOTICE && m.author == "alice"));
}

/// **Scenario: edited record on the remote**
///
/// Someone holding the key rewrites the middle record of Alice's partition.
/// Only that record is flagged and its content is withheld.
#[tokio::test]
async fn test_remote_edit_is_flagged() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);
    let mut bob = test_participant(&remote);

    for (i, content) in ["first", "second", "third"].iter().enumerate() {
        alice
            .send_draft(MessageDraft::new(*content, "alice", fixed_timestamp(i as u32)))
            .await
            .unwrap();
    }

    let cipher = test_cipher(TEST_MNEMONIC);
    let mut tokens = remote_partition(&remote, "alice");
    let mut forged = cipher.open(&tokens[1]).unwrap();
    forged.content = "I owe bob 100".to_string();
    tokens[1] = cipher.seal(&forged).unwrap();
    write_remote_partition(&remote, "alice", &tokens);

    let messages = bob.fetch_messages().await.unwrap();
    assert_integrity(
        &messages,
        &[IntegrityStatus::Verified, IntegrityStatus::Tampered, IntegrityStatus::Verified],
    );
    assert_eq!(messages[1].content, TAMPER_WARNING);
    assert_eq!(messages[2].content, "third");
}

/// **Scenario: record deleted from the remote**
#[tokio::test]
async fn test_remote_deletion_breaks_chain() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);

    for i in 0..3 {
        alice
            .send_draft(MessageDraft::new(format!("m{}", i), "alice", fixed_timestamp(i)))
            .await
            .unwrap();
    }

    let mut tokens = remote_partition(&remote, "alice");
    tokens.remove(1);
    write_remote_partition(&remote, "alice", &tokens);

    let messages = alice.fetch_messages().await.unwrap();
    assert_integrity(&messages, &[IntegrityStatus::Verified, IntegrityStatus::Tampered]);
}

/// **Scenario: lost race**
///
/// A foreign commit lands right before Alice's first push. The retry
/// succeeds and her partition holds exactly one record.
#[tokio::test]
async fn test_rejected_push_retries_once() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);

    let carol_record = HashChainer::seal(MessageDraft::new("from carol", "carol", fixed_timestamp(0)), None);
    let carol_token = test_cipher(TEST_MNEMONIC).seal(&carol_record).unwrap();
    remote.schedule_foreign_commit(
        AuthorId::from_display_name("carol").partition_path(),
        serde_json::to_vec(&vec![carol_token]).unwrap(),
    );

    alice.send_draft(MessageDraft::new("hello", "alice", fixed_timestamp(1))).await.unwrap();

    assert_eq!(remote.push_attempts(), 2);
    assert_eq!(remote_partition(&remote, "alice").len(), 1);

    let messages = alice.fetch_messages().await.unwrap();
    assert_eq!(
        transcript(&messages),
        vec![
            ("carol".to_string(), "from carol".to_string()),
            ("alice".to_string(), "hello".to_string()),
        ]
    );
    assert_all_verified(&messages);
}

/// **Scenario: every attempt loses the race**
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_sync_failed() {
    let remote = test_remote();
    let mut alice = TestParticipantBuilder::new(&remote).with_max_attempts(3).build();

    for i in 0..3 {
        remote.schedule_foreign_commit(format!("notes/{}.txt", i), format!("note {}", i));
    }

    let err = assert_err(alice.send_message("never lands", "alice").await);
    assert!(matches!(err, SessionError::SyncFailed { attempts: 3 }));
    assert!(remote.read_file(TEST_BRANCH, &AuthorId::from_display_name("alice").partition_path()).is_none());

    let local = alice.local_messages().await.unwrap();
    assert!(local.is_empty());
}

/// **Scenario: two publishers at once**
///
/// Both fetch the same state and push; the loser retries on top of the
/// winner and both messages land exactly once.
#[tokio::test(start_paused = true)]
async fn test_concurrent_publishers_converge() {
    let remote = test_remote();
    remote.set_latency(Duration::from_millis(20));
    let mut alice = test_participant(&remote);
    let mut bob = test_participant(&remote);

    let (a, b) = tokio::join!(
        alice.send_draft(MessageDraft::new("from alice", "alice", fixed_timestamp(1))),
        bob.send_draft(MessageDraft::new("from bob", "bob", fixed_timestamp(2))),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(remote.push_attempts(), 3);
    assert_eq!(remote_partition(&remote, "alice").len(), 1);
    assert_eq!(remote_partition(&remote, "bob").len(), 1);

    let messages = alice.fetch_messages().await.unwrap();
    assert_eq!(
        transcript(&messages),
        vec![
            ("alice".to_string(), "from alice".to_string()),
            ("bob".to_string(), "from bob".to_string()),
        ]
    );
}

/// **Scenario: a partition only ever grows by its owner's appends**
#[tokio::test]
async fn test_partitions_are_isolated() {
    let remote = test_remote();
    let mut alice = test_participant(&remote);
    let mut bob = test_participant(&remote);

    bob.send_message("bob speaks", "bob").await.unwrap();
    let bob_before = remote_partition(&remote, "bob");

    alice.send_message("alice one", "alice").await.unwrap();
    alice.send_message("alice two", "alice").await.unwrap();

    assert_eq!(remote_partition(&remote, "bob"), bob_before);
    assert_eq!(remote_partition(&remote, "alice").len(), 2);
}

/// **Scenario: chain continues across sessions**
///
/// A new session for the same author recovers the chain tail from the store.
#[tokio::test]
async fn test_chain_resumes_in_new_session() {
    let remote = test_remote();
    let mut first = test_participant(&remote);
    first.send_message("before restart", "alice").await.unwrap();
    first.close().await.unwrap();

    let mut second = test_participant(&remote);
    let sent = second.send_message("after restart", "alice").await.unwrap();
    assert_eq!(sent.integrity, IntegrityStatus::Verified);

    let cipher = test_cipher(TEST_MNEMONIC);
    let records: Vec<PlaintextMessage> = remote_partition(&remote, "alice")
        .iter()
        .map(|token| cipher.open(token).unwrap())
        .collect();
    assert_eq!(records[1].prev_hash.as_deref(), Some(records[0].hash.as_str()));
}

/// **Scenario: remote offline**
#[tokio::test]
async fn test_unreachable_remote() {
    let remote = test_remote();
    remote.set_reachable(false);
    let mut alice = test_participant(&remote);

    assert!(matches!(
        alice.send_message("hello", "alice").await,
        Err(SessionError::Unreachable(_))
    ));
    assert!(matches!(alice.fetch_messages().await, Err(SessionError::Unreachable(_))));
    assert_eq!(remote.push_attempts(), 0);

    remote.set_reachable(true);
    alice.send_message("hello", "alice").await.unwrap();
    assert_eq!(alice.fetch_messages().await.unwrap().len(), 1);
}

/// **Scenario: remote slower than the network timeout**
#[tokio::test(start_paused = true)]
async fn test_slow_remote_times_out() {
    let remote = test_remote();
    remote.set_latency(Duration::from_secs(60));
    let mut alice = TestParticipantBuilder::new(&remote)
        .with_network_timeout(Duration::from_secs(1))
        .build();

    assert!(matches!(
        alice.send_message("hello", "alice").await,
        Err(SessionError::Unreachable(_))
    ));
    assert_eq!(remote.push_attempts(), 0);
}

/// **Scenario: participant with no remote configured**
#[tokio::test]
async fn test_detached_participant_is_unreachable() {
    let remote = test_remote();
    let mut alice = TestParticipantBuilder::new(&remote).detached().build();

    assert!(matches!(
        alice.send_message("hello", "alice").await,
        Err(SessionError::Unreachable(_))
    ));
}
