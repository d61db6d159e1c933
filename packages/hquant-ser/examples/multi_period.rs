use std::time::Duration;

use hquant_ser::context::lock_context;
use hquant_ser::feed::{spawn_loader, LoaderOptions, MemorySource};
use hquant_ser::{Calendar, Frequency, IndicatorDescriptor, IndicatorKind, Quote, SerKey, Workspace};

fn main() -> hquant_ser::Result<()> {
    tracing_subscriber::fmt::init();

    // 1-minute quotes feed a 15-minute and a 4-hour series.
    let mut ws = Workspace::new(Calendar::utc());
    let m1 = SerKey::new("BTCUSDT", Frequency::ONE_MIN);
    let m15 = SerKey::new("BTCUSDT", Frequency::FIFTEEN_MIN);
    let h4 = SerKey::new("BTCUSDT", Frequency::parse("4h")?);
    for key in [&m1, &m15, &h4] {
        ws.open(key.clone());
    }
    ws.chain(&m1, &m15)?;
    ws.chain(&m15, &h4)?;

    let ctx15 = ws.try_get(&m15)?;
    let rsi15 = lock_context(&ctx15)?.add_indicator(&IndicatorDescriptor::new(IndicatorKind::Rsi))?;
    let ctx4h = ws.try_get(&h4)?;
    let ma4h = lock_context(&ctx4h)?
        .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Ma).with_opt("period", 3.0)?)?;

    let quotes: Vec<Quote> = (0..24 * 60)
        .map(|i| {
            let close = 30_000.0 + (i as f64 / 37.0).sin() * 150.0;
            Quote::new(i * 60_000, close, close + 5.0, close - 5.0, close, 2.0)
        })
        .collect();

    // Load the first half on a background thread, then feed the rest directly.
    let (first, rest) = quotes.split_at(quotes.len() / 2);
    let handle = spawn_loader(
        ws.try_get(&m1)?,
        Box::new(MemorySource::new("memory", first.to_vec())),
        LoaderOptions {
            poll_interval: Duration::from_millis(10),
            one_shot: true,
        },
    );
    let loaded = handle.join()?;
    let ctx1 = ws.try_get(&m1)?;
    let loaded_from = lock_context(&ctx1)?.base_ser().first_occurred_time();
    if let Some(t) = loaded_from {
        ws.recompose(&m1, t)?;
    }
    println!("loader: {loaded:?}");
    ws.feed_quotes(&m1, rest)?;

    let ctx15 = lock_context(&ctx15)?;
    println!(
        "15m bars={} rsi_last={:?}",
        ctx15.base_ser().len(),
        ctx15.indicator_values(rsi15, "rsi").and_then(|v| v.last())
    );
    drop(ctx15);

    let ctx4h = lock_context(&ctx4h)?;
    println!(
        "4h bars={} ma_last={:?}",
        ctx4h.base_ser().len(),
        ctx4h.indicator_values(ma4h, "ma").and_then(|v| v.last())
    );
    Ok(())
}
