#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::{Tensor, TensorData};
    use deconfounder::config::FactorModelConfig;
    use deconfounder::model::reconcile::reconcile_row_counts;
    use deconfounder::model::FactorModel;
    use deconfounder::DeconfoundError;

    type Backend = NdArray<f32>;

    fn deterministic(
        units: usize,
        time: usize,
        features: usize,
        offset: f32,
    ) -> Tensor<Backend, 3> {
        let values: Vec<f32> = (0..units * time * features)
            .map(|i| offset + 0.01 * i as f32)
            .collect();
        Tensor::from_data(
            TensorData::new(values, [units, time, features]),
            &Default::default(),
        )
    }

    fn create_model(num_confounders: usize) -> FactorModel<Backend> {
        let config = FactorModelConfig::new(2, 2, num_confounders, 3, 16, 8);
        FactorModel::new(&config, &Default::default()).unwrap()
    }

    #[test]
    fn test_prediction_rows_for_batch_sizes() {
        let model = create_model(1);
        for units in [1, 4, 7] {
            let output = model
                .forward(
                    deterministic(units, 3, 2, 0.0),
                    deterministic(units, 3, 2, 0.5),
                    deterministic(units, 3, 2, 0.1),
                )
                .unwrap();
            assert_eq!(output.treatment_predictions.dims(), [units * 4, 2]);
        }
    }

    #[test]
    fn test_off_by_one_current_covariates() {
        let model = create_model(2);
        let output = model
            .forward(
                deterministic(4, 3, 2, 0.0),
                deterministic(4, 3, 2, 0.5),
                deterministic(4, 2, 2, 0.1),
            )
            .unwrap();

        // max(4 * (3 + 1), 4 * 2)
        assert_eq!(output.decoder_rows(), 16);
    }

    #[test]
    fn test_reconciliation_rows_are_the_larger_length() {
        let device = Default::default();
        let confounders = Tensor::<Backend, 2>::ones([16, 1], &device);
        let covariates = Tensor::<Backend, 2>::ones([12, 2], &device);
        let alignment = reconcile_row_counts(confounders, covariates);
        assert_eq!(alignment.rows(), 16);

        let input = alignment.into_decoder_input();
        let tail: Tensor<Backend, 2> = input.slice([12..16, 1..3]);
        assert_eq!(tail.sum().into_scalar(), 0.0);
    }

    #[test]
    fn test_forward_call_order_does_not_matter() {
        let model = create_model(1);
        let first = || {
            (
                deterministic(4, 3, 2, 0.0),
                deterministic(4, 3, 2, 0.5),
                deterministic(4, 3, 2, 0.1),
            )
        };
        let second = || {
            (
                deterministic(2, 3, 2, 0.9),
                deterministic(2, 3, 2, 0.3),
                deterministic(2, 3, 2, 0.7),
            )
        };

        let (a, b, c) = first();
        let before = model.forward(a, b, c).unwrap();
        let (a, b, c) = second();
        model.forward(a, b, c).unwrap();
        let (a, b, c) = first();
        let after = model.forward(a, b, c).unwrap();

        let diff = (before.confounders - after.confounders)
            .abs()
            .sum()
            .into_scalar();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let model = create_model(1);
        let previous = deterministic(4, 3, 2, 0.0);
        let snapshot = previous.clone().into_data().to_vec::<f32>().unwrap();

        model
            .forward(
                previous.clone(),
                deterministic(4, 3, 2, 0.5),
                deterministic(4, 3, 2, 0.1),
            )
            .unwrap();

        assert_eq!(previous.into_data().to_vec::<f32>().unwrap(), snapshot);
    }

    #[test]
    fn test_unit_count_disagreement_is_loud() {
        let model = create_model(1);
        let result = model.forward(
            deterministic(4, 3, 2, 0.0),
            deterministic(3, 3, 2, 0.5),
            deterministic(4, 3, 2, 0.1),
        );
        assert!(matches!(result, Err(DeconfoundError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_treatment_width_mismatch_is_loud() {
        let model = create_model(1);
        let result = model.forward(
            deterministic(4, 3, 2, 0.0),
            deterministic(4, 3, 3, 0.5),
            deterministic(4, 3, 2, 0.1),
        );
        assert!(matches!(result, Err(DeconfoundError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_too_many_treatments_rejected() {
        let config = FactorModelConfig::new(60, 2, 1, 3, 16, 8);
        let result = FactorModel::<Backend>::new(&config, &Default::default());
        assert!(matches!(result, Err(DeconfoundError::InvalidConfig(_))));
    }
}
