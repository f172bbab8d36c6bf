//! Argmax classification.

use candle_core::{Module, Tensor};
use cure_models::Category;

use crate::convnext::ConvNeXt;
use crate::error::{VisionError, VisionResult};

/// Predicted category and the raw logits it was picked from.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub category: Category,
    pub scores: Vec<f32>,
}

/// Run `model` on a `(1, 1, H, W)` input and take the highest-scoring class.
///
/// Ties resolve to the lowest index.
pub fn classify(model: &ConvNeXt, input: &Tensor) -> VisionResult<Prediction> {
    let logits = model.forward(&input.detach())?;
    let scores: Vec<f32> = logits.flatten_all()?.to_vec1()?;

    let index = argmax(&scores)
        .ok_or_else(|| VisionError::internal("model produced no class scores"))?;
    let category = Category::new(index, model.num_classes())?;

    Ok(Prediction { category, scores })
}

fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convnext::tests::micro_config;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[-3.0, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_classify_returns_index_in_range() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = ConvNeXt::load(&micro_config(), 3, vb).unwrap();

        let input = Tensor::randn(0f32, 1f32, (1, 1, 32, 32), &Device::Cpu).unwrap();
        let prediction = classify(&model, &input).unwrap();

        assert_eq!(prediction.scores.len(), 3);
        assert!(prediction.category.index() < 3);
        let best = prediction.scores[prediction.category.index()];
        assert!(prediction.scores.iter().all(|s| *s <= best));
    }
}
