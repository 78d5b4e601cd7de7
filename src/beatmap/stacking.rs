use crate::beatmap::process::{ProcessedHitObject, ProcessedKind};
use crate::config::GameplayConfig;
use crate::geometry::Point;
use cgmath::MetricSpace;

/// Assigns integer stack heights to near-coincident hit objects and shifts
/// their positions accordingly. Directional greedy pass over the objects in
/// reverse start-time order; the backward scan stops at the first object
/// outside the leniency window, so chains never reach arbitrarily far back.
pub fn apply_stacking(
    objects: &mut [ProcessedHitObject],
    approach_time: f64,
    stack_leniency: f32,
    config: &GameplayConfig,
) {
    if objects.len() > 1 {
        let stack_threshold = approach_time * f64::from(stack_leniency);
        assign_heights(objects, stack_threshold, config.stack_distance);
    }
    for object in objects.iter_mut() {
        apply_shift(object, config.stack_shift);
    }
}

fn slider_end_position(object: &ProcessedHitObject) -> Point {
    match &object.kind {
        ProcessedKind::Slider(data) => data.path.end_point(),
        _ => object.position,
    }
}

fn assign_heights(objects: &mut [ProcessedHitObject], stack_threshold: f64, stack_distance: f32) {
    for mut i in (1..objects.len()).rev() {
        if objects[i].stack_height != 0 || objects[i].is_spinner() {
            continue;
        }

        let mut n = i;
        if objects[i].is_circle() {
            while n > 0 {
                n -= 1;
                if objects[n].is_spinner() {
                    continue;
                }
                if objects[i].start_time - objects[n].end_time > stack_threshold {
                    break;
                }

                if objects[n].is_slider()
                    && slider_end_position(&objects[n]).distance(objects[i].position)
                        < stack_distance
                {
                    // A circle stacked on a slider end pushes everything
                    // between them down-right instead of continuing the
                    // up-left chain.
                    let offset = objects[i].stack_height - objects[n].stack_height + 1;
                    let end = slider_end_position(&objects[n]);
                    for j in n + 1..=i {
                        if end.distance(objects[j].position) < stack_distance {
                            objects[j].stack_height -= offset;
                        }
                    }
                    break;
                }

                if objects[n].position.distance(objects[i].position) < stack_distance {
                    objects[n].stack_height = objects[i].stack_height + 1;
                    i = n;
                }
            }
        } else if objects[i].is_slider() {
            while n > 0 {
                n -= 1;
                if objects[n].is_spinner() {
                    continue;
                }
                if objects[i].start_time - objects[n].start_time > stack_threshold {
                    break;
                }
                if slider_end_position(&objects[n]).distance(objects[i].position) < stack_distance {
                    objects[n].stack_height = objects[i].stack_height + 1;
                    i = n;
                }
            }
        }
    }
}

fn apply_shift(object: &mut ProcessedHitObject, stack_shift: f32) {
    if object.stack_height == 0 {
        return;
    }
    let amount = object.stack_height as f32 * stack_shift;
    let offset = Point::new(amount, amount);
    object.position += offset;
    object.end_position += offset;
    if let ProcessedKind::Slider(data) = &mut object.kind {
        data.path.translate(offset);
    }
}
