use console::Style;
use deseq_core::io::header::FileHeader;
use deseq_core::io::sidecar::SidecarMetadata;
use deseq_core::SequenceRead;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    path: Style,
    disabled: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
            disabled: Style::new().dim().yellow(),
        }
    }
}

fn row(s: &Styles, label: &str, value: impl std::fmt::Display) {
    println!("  {:<18}{}", s.label.apply_to(label), s.value.apply_to(value));
}

pub fn print_header(title: &str, header: &FileHeader) {
    let s = Styles::new();
    println!();
    println!("  {}", s.title.apply_to(title));
    row(&s, "Dimensions", format!("{}x{}", header.width, header.height));
    row(
        &s,
        "Bit depth",
        format!("{} ({} stored)", header.real_bit_depth, header.bit_depth),
    );
    row(&s, "Sample type", header.sample_type);
    row(&s, "Frames (header)", header.declared_frame_count);
    row(&s, "Record size", format!("{} bytes", header.record_size));
    row(&s, "FPS (header)", format!("{:.3}", header.declared_fps));
}

pub fn print_sidecar(sidecar: &SidecarMetadata) {
    let s = Styles::new();
    println!();
    println!("  {}", s.title.apply_to("Sidecar"));
    row(
        &s,
        "Image size",
        format!("{}x{}", sidecar.image_width, sidecar.image_height),
    );
    row(&s, "Frame rate", format!("{} Hz", sidecar.frame_rate));
    row(&s, "Pre-buffer", sidecar.segment_pre_buffer);
    row(&s, "Dark reference", yes_no(sidecar.dark_reference));
    row(&s, "Gain reference", yes_no(sidecar.gain_reference));
}

pub fn print_read_summary(read: &SequenceRead) {
    let s = Styles::new();
    let meta = &read.metadata;

    println!();
    println!("  {}", s.title.apply_to("Sequence"));
    println!(
        "  {:<18}{}",
        s.label.apply_to("File"),
        s.path.apply_to(meta.files.file.display())
    );
    for (i, pair) in meta.files.segments.iter().enumerate() {
        println!(
            "  {:<18}{} + {}",
            s.label.apply_to(format!("Segment {i}")),
            s.path.apply_to(pair.top.display()),
            s.path.apply_to(pair.bottom.display())
        );
    }
    row(&s, "Shape", format!("{:?}", read.data.shape()));
    row(&s, "Sample type", read.data.sample_type());
    row(&s, "Lazy", yes_no(read.data.is_lazy()));
    row(&s, "Frames", meta.frame_count);
    row(&s, "Frame rate", format!("{} Hz", meta.frame_rate));

    let present = |p: bool| {
        if p {
            s.value.apply_to("loaded".to_string())
        } else {
            s.disabled.apply_to("absent".to_string())
        }
    };
    println!(
        "  {:<18}{}",
        s.label.apply_to("Dark reference"),
        present(meta.references.dark.is_some())
    );
    println!(
        "  {:<18}{}",
        s.label.apply_to("Gain reference"),
        present(meta.references.gain.is_some())
    );
    if let Some(size) = meta.pixel_size() {
        row(&s, "Pixel size", size);
    }
    if let Some(ref ts) = meta.timestamps {
        if let (Some(first), Some(last)) = (ts.first(), ts.last()) {
            row(
                &s,
                "Duration",
                format!("{:.6} s", last.as_secs_f64() - first.as_secs_f64()),
            );
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
