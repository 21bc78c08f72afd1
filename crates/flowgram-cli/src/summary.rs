use std::path::Path;

use console::Style;
use flowgram_core::frame::SourceInfo;

use crate::commands::config::RunConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &RunConfig, info: &SourceInfo, output: &Path) {
    let s = Styles::new();
    let flow = &config.flow;

    println!();
    println!("  {}", s.title.apply_to("Flowgram"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(8)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(info.path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value
            .apply_to(format!("{} ({}x{})", info.frame_count, info.width, info.height))
    );
    println!();

    println!("  {}", s.header.apply_to("Histogram"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Pools"),
        s.value.apply_to(flow.pool_count)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max Value"),
        s.value.apply_to(flow.max_value)
    );
    if flow.mirror_half {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Mirror"),
            s.value.apply_to(format!("{} columns", flow.rendered_width()))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Mirror"),
            s.disabled.apply_to("off")
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Focus"),
        s.value
            .apply_to(format!("{:.2} \u{00b1} {:.2}", flow.focus_point, flow.focus_size / 2.0))
    );
    println!();

    println!("  {}", s.header.apply_to("Flow"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Block"),
        s.value.apply_to(format!("{} px", config.block_size))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Queue"),
        s.value
            .apply_to(format!("{} jobs", config.coordinator.high_water_mark))
    );
    println!();
}
