use hquant_ser::event::{EventFilter, OwnerId, SerEventKind};
use hquant_ser::{Calendar, Frequency, IndicatorDescriptor, IndicatorKind, Placement, Quote, SerContext, SerKey};

fn main() -> hquant_ser::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut ctx = SerContext::new(SerKey::new("DEMO", Frequency::DAILY), Calendar::utc());
    let rsi = ctx.add_indicator(&IndicatorDescriptor::new(IndicatorKind::Rsi))?;
    let ema = ctx.add_indicator(
        &IndicatorDescriptor::new(IndicatorKind::Ema)
            .with_opt("period", 20.0)?
            .with_placement(Placement::InPlace),
    )?;
    // EMA of the RSI line
    let rsi_col = ctx
        .indicator(rsi)
        .and_then(|i| i.var_name("rsi"))
        .unwrap_or("rsi")
        .to_string();
    let rsi_out = ctx.indicator(rsi).and_then(|i| i.output()).unwrap_or(ctx.base());
    let smooth = ctx.add_indicator_on(
        &IndicatorDescriptor::new(IndicatorKind::Ema)
            .with_source(rsi_col)
            .with_opt("period", 5.0)?,
        rsi_out,
    )?;

    ctx.subscribe(
        OwnerId(1),
        EventFilter::all().with_kind(SerEventKind::FinishedComputing),
        |ev| println!("finished {:?} rows {}..={}", ev.origin, ev.from_time, ev.to_time),
    );

    let day = 86_400_000;
    let quotes: Vec<Quote> = (0..200)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 5.0;
            Quote::new(i * day, close, close + 1.0, close - 1.0, close, 1000.0)
        })
        .collect();
    let report = ctx.ingest(&quotes)?;
    println!("appended={} skipped={}", report.appended, report.skipped);

    let last = |id, name| {
        ctx.indicator_values(id, name)
            .and_then(|v| v.last().copied())
            .unwrap_or(f64::NAN)
    };
    println!("rsi_last={:.2}", last(rsi, "rsi"));
    println!("ema_last={:.2}", last(ema, "ema"));
    println!("rsi_ema_last={:.2}", last(smooth, "ema"));
    ctx.remove_observers_of(OwnerId(1));
    Ok(())
}
