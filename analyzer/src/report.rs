//! Human-readable report of a [`FlopSummary`]
//!
//! Three sections: the process summary, one table per routine with its instruction form rows,
//! and the per-thread breakdown of every activation.

use std::cmp::Reverse;

use itertools::Itertools;

use crate::{FlopSummary, RoutineStats, StatsReport};

const LABEL_WIDTH: usize = 40;

/// Builds the text report.  Only floating-point forms are listed unless `all_forms` is set.
pub fn report(summary: &FlopSummary, all_forms: bool) -> String {
    let mut output = StatsReport::new();
    output.set_label_width(LABEL_WIDTH);
    output.set_total_flops(summary.total_flops);

    output.title("FLOP COUNT SUMMARY");
    output.add_value("Version", &summary.version);
    output.add_value("Counting mode", &summary.mode.to_string());
    output.add_value("FP criterion", &summary.fp_criterion.to_string());
    output.add_count("Threads", summary.threads.len() as u64);
    output.add_count("Routines", summary.routines.len() as u64);
    output.add_count("Instruction forms", summary.distinct_forms as u64);
    output.add_count("Instructions", summary.total_instructions);
    output.add_count("FLOPs", summary.total_flops);

    output.title_count_flops_perc("ROUTINE", "INSTRUCTIONS", "FLOPS");
    let ranking = summary.routines.iter().sorted_by_key(|routine| Reverse(routine.flops));
    for routine in ranking {
        let comment = format!(" calls: {}", routine.calls);
        output.add_count_flops_perc(&routine.name, routine.icount, routine.flops, &comment);
    }

    output.title("ROUTINES");
    for routine in &summary.routines {
        add_routine(&mut output, routine, all_forms);
    }

    output.title("THREADS");
    for thread in &summary.threads {
        output.ln();
        output.set_identation(0);
        output.add(&format!("Thread {}\n", thread.tid));
        output.set_identation(1);
        output.add_count("Activations", thread.activations.len() as u64);
        output.add_count("Instructions", thread.icount);
        output.add_count("FLOPs", thread.flops);
        for activation in &thread.activations {
            output.set_identation(1);
            output.add_separator();
            add_routine(&mut output, activation, all_forms);
        }
        output.set_identation(0);
    }

    output.output
}

fn add_routine(output: &mut StatsReport, routine: &RoutineStats, all_forms: bool) {
    let header = format!("\n{}{}\n", output.identation, routine.name);
    output.add(&header);
    let image = if routine.image.is_empty() { "-" } else { routine.image.as_str() };
    output.add_value("Image", image);
    let address = routine.address.map_or_else(|| "-".to_string(), |a| format!("{a:#x}"));
    output.add_value("Address", &address);
    output.add_count("Calls", routine.calls);
    output.add_count("Instructions", routine.icount);
    output.add_count("FLOPs", routine.flops);

    let forms =
        routine.forms.iter().filter(|form| all_forms || form.attributes.is_flop).collect_vec();
    if forms.is_empty() {
        return;
    }
    output.title_form_table();
    for form in forms {
        let attributes = &form.attributes;
        let operands = attributes.operands.iter().map(ToString::to_string).collect_vec();
        output.add_form_row(
            &attributes.iform_name,
            attributes.category.name(),
            &attributes.extension,
            form.count,
            form.flops,
            [attributes.is_fma, attributes.is_scalar_simd, attributes.is_mask_op],
            &operands,
        );
    }
}
