use anyhow::{ensure, Context as _};
use futures_util::future::join_all;
use mocknet::{Context, NetError, Network, Role, RoleId, SlotKey, Transport};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn ctx() -> Context {
    Context::background().with_timeout(Duration::from_secs(5))
}

fn roles(n: u32) -> Vec<RoleId> {
    (0..n).map(RoleId).collect()
}

/// Toy coin-tossing round: every party contributes four bytes and the result
/// is their XOR. Written only against [`Transport`], like a protocol round.
pub async fn xor_agree<T: Transport>(ctx: &Context, transport: &T, share: [u8; 4]) -> anyhow::Result<[u8; 4]> {
    let received = transport.exchange(ctx, &share).await?;
    ensure!(
        received.len() == transport.peers().len(),
        "expected one share per peer, got {}",
        received.len()
    );

    let mut out = share;
    for (role, bytes) in received {
        ensure!(bytes.len() == 4, "share from {role} has {} bytes", bytes.len());
        for (acc, b) in out.iter_mut().zip(bytes) {
            *acc ^= b;
        }
    }
    Ok(out)
}

pub async fn test_ping_pong(net: &Network) -> anyhow::Result<()> {
    const ROUNDS: u8 = 5;

    let (p1, p2) = net.pair(Role::P1, Role::P2);
    let ctx = ctx();

    let party1 = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for i in 0..ROUNDS {
                p1.send(&ctx, Role::P2.id(), &[i]).await?;
                let got = p1.receive(&ctx, Role::P2.id()).await?;
                ensure!(got.len() == 1, "p1 round {i} got {got:?}");
                seen.push(got[0]);
            }
            Ok::<_, anyhow::Error>(seen)
        })
    };

    let party2 = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            for i in 0..ROUNDS {
                let got = p2.receive(&ctx, Role::P1.id()).await?;
                ensure!(got == vec![i], "p2 round {i} got {got:?}");
                p2.send(&ctx, Role::P1.id(), &[i + 1]).await?;
            }
            Ok::<_, anyhow::Error>(())
        })
    };

    let seen = party1.await??;
    party2.await??;

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(net.pending_slots(), 0);
    Ok(())
}

pub async fn test_three_party_barrier(net: &Network) -> anyhow::Result<()> {
    let roles = roles(3);
    let ctx = ctx();

    let handles = net.mesh(&roles).into_iter().map(|ep| {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let me = ep.local_role();
            let others = ep.peers();
            for &peer in &others {
                ep.send(&ctx, peer, &[me.as_u32() as u8]).await?;
            }
            let batch = ep.receive_all(&ctx, &others).await?;
            Ok::<_, anyhow::Error>((me, batch))
        })
    });

    for result in join_all(handles).await {
        let (me, batch) = result??;
        assert_eq!(batch.len(), 2, "party {me} got {batch:?}");
        for (from, msg) in batch {
            assert_ne!(from, me);
            assert_eq!(msg, vec![from.as_u32() as u8]);
        }
    }

    assert_eq!(net.pending_slots(), 0);
    Ok(())
}

/// Every party streams numbered messages to every other party at once; each
/// receiver checks that every stream arrives complete, in order and only from
/// its own sender.
pub async fn test_concurrent_streams(net: &Network, parties: u32, count: u32) -> anyhow::Result<()> {
    let roles = roles(parties);
    let ctx = ctx();
    let endpoints: Vec<_> = net.mesh(&roles).into_iter().map(Arc::new).collect();

    let mut tasks = Vec::new();
    for ep in &endpoints {
        for peer in ep.peers() {
            let sender = ep.clone();
            let send_ctx = ctx.clone();
            tasks.push(tokio::spawn(async move {
                let me = sender.local_role().as_u32();
                for i in 0..count {
                    let mut payload = me.to_be_bytes().to_vec();
                    payload.extend_from_slice(&i.to_be_bytes());
                    sender.send(&send_ctx, peer, &payload).await?;
                }
                Ok::<_, anyhow::Error>(())
            }));

            let receiver = ep.clone();
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..count {
                    let msg = receiver.receive(&ctx, peer).await?;
                    ensure!(msg.len() == 8, "unexpected payload {msg:?}");
                    let from = u32::from_be_bytes(msg[..4].try_into()?);
                    let n = u32::from_be_bytes(msg[4..].try_into()?);
                    ensure!(from == peer.as_u32(), "stream from {peer} carried a message from {from}");
                    ensure!(n == i, "stream from {peer} out of order: expected {i}, got {n}");
                }
                Ok::<_, anyhow::Error>(())
            }));
        }
    }

    for result in join_all(tasks).await {
        result??;
    }

    for ep in &endpoints {
        for peer in ep.peers() {
            assert_eq!(ep.send_seq(peer), Some(u64::from(count)));
            assert_eq!(ep.recv_seq(peer), Some(u64::from(count)));
        }
    }
    assert_eq!(net.pending_slots(), 0);

    let expected = u64::from(parties * (parties - 1) * count);
    assert_eq!(net.stats().messages_delivered, expected);
    assert_eq!(net.stats().messages_received, expected);
    Ok(())
}

pub async fn test_pairing_isolation(net: &Network) -> anyhow::Result<()> {
    let eps = net.mesh(&roles(3));
    let ctx = ctx();

    eps[0].send(&ctx, RoleId(1), b"for one").await?;

    let short = Context::background().with_timeout(Duration::from_millis(20));
    let err = eps[2].receive(&short, RoleId(0)).await.unwrap_err();
    assert_eq!(err, NetError::DeadlineExceeded);

    // The reverse direction is its own sequence.
    let short = Context::background().with_timeout(Duration::from_millis(20));
    let err = eps[0].receive(&short, RoleId(1)).await.unwrap_err();
    assert_eq!(err, NetError::DeadlineExceeded);

    assert_eq!(eps[1].receive(&ctx, RoleId(0)).await?, b"for one".to_vec());
    assert_eq!(eps[2].recv_seq(RoleId(0)), Some(0));
    Ok(())
}

pub async fn test_self_rejection(net: &Network) -> anyhow::Result<()> {
    let ep2p = net.ep_2p(Role::P1, Role::P2);
    let epmp = net.ep_mp(RoleId(0), roles(3));
    let ctx = ctx();

    let me = RoleId(0);
    assert_eq!(ep2p.send(&ctx, me, b"x").await, Err(NetError::InvalidPeer { role: me, reason: mocknet::PeerReason::SelfAddressed }));
    assert!(matches!(ep2p.receive(&ctx, me).await, Err(NetError::InvalidPeer { .. })));
    assert!(matches!(epmp.receive_all(&ctx, &[me]).await, Err(NetError::InvalidPeer { .. })));
    assert!(matches!(epmp.receive_all(&ctx, &[RoleId(1), me]).await, Err(NetError::InvalidPeer { .. })));

    assert_eq!(net.pending_slots(), 0);
    assert_eq!(net.stats(), Default::default());
    Ok(())
}

pub async fn test_duplicate_rejection(net: &Network) -> anyhow::Result<()> {
    let eps = net.mesh(&roles(3));
    let ctx = ctx();

    let err = eps[0].receive_all(&ctx, &[RoleId(2), RoleId(1), RoleId(2)]).await.unwrap_err();
    assert_eq!(err, NetError::DuplicateRole(RoleId(2)));
    assert_eq!(net.pending_slots(), 0);

    // Nothing advanced: the first real message is still read at seq 0.
    eps[2].send(&ctx, RoleId(0), b"first").await?;
    assert_eq!(eps[0].recv_seq(RoleId(2)), Some(0));
    assert_eq!(eps[0].receive(&ctx, RoleId(2)).await?, b"first".to_vec());
    Ok(())
}

pub async fn test_cancellation_idempotence(net: &Network) -> anyhow::Result<()> {
    let (a, b) = net.pair(RoleId(0), RoleId(1));

    let expired = Context::background().with_timeout(Duration::ZERO);
    let started = Instant::now();
    let err = b.receive(&expired, RoleId(0)).await.unwrap_err();
    assert_eq!(err, NetError::DeadlineExceeded);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(b.recv_seq(RoleId(0)), Some(0));

    let ctx = ctx();
    let sender = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            a.send(&ctx, RoleId(1), b"late").await
        })
    };

    assert_eq!(b.receive(&ctx, RoleId(0)).await?, b"late".to_vec());
    sender.await??;
    assert_eq!(b.recv_seq(RoleId(0)), Some(1));
    Ok(())
}

pub async fn test_explicit_cancel_unblocks_receiver(net: &Network) -> anyhow::Result<()> {
    let (_a, b) = net.pair(RoleId(0), RoleId(1));
    let b = Arc::new(b);

    let ctx = Context::background();
    let waiter = {
        let b = b.clone();
        let ctx = ctx.child();
        let cancel = ctx.clone();
        let handle = tokio::spawn(async move { b.receive(&ctx, RoleId(0)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        handle
    };

    assert_eq!(waiter.await?, Err(NetError::Canceled));
    assert!(ctx.err().is_none(), "cancelling a child must not end the parent");
    assert_eq!(b.recv_seq(RoleId(0)), Some(0));
    Ok(())
}

/// A second receive toward the same peer waits on the first one's lock; its
/// own context still unblocks it.
pub async fn test_lock_wait_observes_context(net: &Network) -> anyhow::Result<()> {
    let (a, b) = net.pair(RoleId(0), RoleId(1));
    let b = Arc::new(b);
    let ctx = ctx();

    let first = {
        let b = b.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { b.receive(&ctx, RoleId(0)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let short = Context::background().with_timeout(Duration::from_millis(20));
    assert_eq!(b.receive(&short, RoleId(0)).await, Err(NetError::DeadlineExceeded));

    a.send(&ctx, RoleId(1), b"only").await?;
    assert_eq!(first.await??, b"only".to_vec());
    Ok(())
}

/// A group receive keeps every requested peer's receive lock until it returns.
/// A concurrent single receive toward one of those peers waits behind it even
/// when that peer's next message is already available.
pub async fn test_receive_all_holds_locks(net: &Network) -> anyhow::Result<()> {
    let eps: Vec<_> = net.mesh(&roles(3)).into_iter().map(Arc::new).collect();
    let ctx = ctx();

    eps[1].send(&ctx, RoleId(0), b"one-0").await?;
    eps[1].send(&ctx, RoleId(0), b"one-1").await?;

    let batch = {
        let ep = eps[0].clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { ep.receive_all(&ctx, &[RoleId(1), RoleId(2)]).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!batch.is_finished());

    let short = Context::background().with_timeout(Duration::from_millis(20));
    assert_eq!(eps[0].receive(&short, RoleId(1)).await, Err(NetError::DeadlineExceeded));
    assert!(!batch.is_finished());

    eps[2].send(&ctx, RoleId(0), b"two-0").await?;
    let batch = batch.await??;
    assert_eq!(batch[&RoleId(1)], b"one-0".to_vec());
    assert_eq!(batch[&RoleId(2)], b"two-0".to_vec());

    assert_eq!(eps[0].receive(&ctx, RoleId(1)).await?, b"one-1".to_vec());
    assert_eq!(eps[0].recv_seq(RoleId(1)), Some(2));
    assert_eq!(net.pending_slots(), 0);
    Ok(())
}

pub async fn test_exchange_rounds(net: &Network, parties: u32, rounds: u8) -> anyhow::Result<()> {
    let roles = roles(parties);
    let ctx = ctx();

    let handles = net.mesh(&roles).into_iter().map(|ep| {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let me = ep.local_role().as_u32() as u8;
            for round in 0..rounds {
                let batch = ep.exchange(&ctx, &[round, me]).await?;
                ensure!(batch.len() == ep.peers().len(), "round {round}: short batch");
                for (from, msg) in batch {
                    ensure!(
                        msg == vec![round, from.as_u32() as u8],
                        "round {round}: party {me} got {msg:?} from {from}"
                    );
                }
            }
            Ok::<_, anyhow::Error>(())
        })
    });

    for result in join_all(handles).await {
        result??;
    }
    assert_eq!(net.pending_slots(), 0);
    Ok(())
}

pub async fn test_xor_agree(net: &Network) -> anyhow::Result<()> {
    let ctx = ctx();
    let shares: BTreeMap<RoleId, [u8; 4]> = [
        (RoleId(0), [0x01, 0x02, 0x03, 0x04]),
        (RoleId(1), [0x10, 0x20, 0x30, 0x40]),
        (RoleId(2), [0xff, 0x00, 0xff, 0x00]),
    ]
    .into_iter()
    .collect();
    let roles: Vec<_> = shares.keys().copied().collect();

    let handles = net.mesh(&roles).into_iter().map(|ep| {
        let ctx = ctx.clone();
        let share = shares[&ep.local_role()];
        tokio::spawn(async move { xor_agree(&ctx, &ep, share).await })
    });

    let mut results = Vec::new();
    for result in join_all(handles).await {
        results.push(result??);
    }

    assert!(results.iter().all(|r| *r == [0xee, 0x22, 0xcc, 0x44]));

    // The same round works over a two-party channel.
    let (p1, p2) = net.pair(Role::P1, Role::P2);
    let (r1, r2) = tokio::join!(
        xor_agree(&ctx, &p1, [1, 1, 1, 1]),
        xor_agree(&ctx, &p2, [2, 2, 2, 2])
    );
    assert_eq!(r1.context("p1")?, [3, 3, 3, 3]);
    assert_eq!(r2.context("p2")?, [3, 3, 3, 3]);
    Ok(())
}

/// Delivering twice to the same key without a receive in between. The
/// blocked deliver runs on the calling task.
pub async fn test_occupied_slot_blocks(net: &Network) -> anyhow::Result<()> {
    let ctx = ctx();
    let key = SlotKey::new(RoleId(0), RoleId(1), 0);

    net.deliver(&ctx, key, b"first").await?;

    let reader = {
        let net = net.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            net.await_message(&ctx, key).await
        })
    };

    net.deliver(&ctx, key, b"second").await?;
    assert_eq!(reader.await??, b"first".to_vec());
    assert_eq!(net.await_message(&ctx, key).await?, b"second".to_vec());
    assert_eq!(net.stats().occupied_slots, 1);
    assert_eq!(net.pending_slots(), 0);
    Ok(())
}

pub async fn test_occupied_slot_rejected(net: &Network) -> anyhow::Result<()> {
    let ctx = ctx();
    let key = SlotKey::new(RoleId(0), RoleId(1), 0);

    net.deliver(&ctx, key, b"first").await?;
    assert_eq!(net.deliver(&ctx, key, b"second").await, Err(NetError::ProtocolMisuse(key)));
    assert_eq!(net.await_message(&ctx, key).await?, b"first".to_vec());
    Ok(())
}
